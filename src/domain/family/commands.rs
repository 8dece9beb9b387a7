use super::value_objects::{FamilyResponsibility, FamilyRole};

// ============================================================================
// Family Commands
// ============================================================================

#[derive(Debug, Clone)]
pub enum FamilyCommand {
    AddMember {
        user_id: String,
        role: FamilyRole,
        responsibility: FamilyResponsibility,
        added_by: String,
    },
    RemoveMember {
        user_id: String,
        removed_by: String,
    },
    ChangeMemberRole {
        user_id: String,
        new_role: FamilyRole,
        new_responsibility: FamilyResponsibility,
        changed_by: String,
    },
    DeleteFamily,
}
