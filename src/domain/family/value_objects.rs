use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Family Value Objects
// ============================================================================

pub const FAMILY_NAME_MIN_LEN: usize = 2;
pub const FAMILY_NAME_MAX_LEN: usize = 100;
pub const MAX_AUXILIARY_RESPONSIBLES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FamilyRole {
    Grandfather,
    Grandmother,
    Father,
    Mother,
    Son,
    Daughter,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FamilyResponsibility {
    PrincipalResponsible,
    AuxiliaryResponsible,
    Member,
}

impl FamilyResponsibility {
    pub fn is_responsible(self) -> bool {
        matches!(
            self,
            FamilyResponsibility::PrincipalResponsible | FamilyResponsibility::AuxiliaryResponsible
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub user_id: String,
    pub role: FamilyRole,
    pub responsibility: FamilyResponsibility,
    pub joined_at: DateTime<Utc>,
}
