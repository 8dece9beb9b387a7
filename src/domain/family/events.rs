use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{FamilyResponsibility, FamilyRole};
use crate::event_sourcing::core::DomainEvent;

// ============================================================================
// Family Domain Events
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event_type", content = "payload")]
pub enum FamilyEvent {
    #[serde(rename = "FamilyCreatedEvent")]
    Created(FamilyCreated),
    #[serde(rename = "MemberAddedEvent")]
    MemberAdded(MemberAdded),
    #[serde(rename = "MemberRemovedEvent")]
    MemberRemoved(MemberRemoved),
    #[serde(rename = "MemberRoleChangedEvent")]
    MemberRoleChanged(MemberRoleChanged),
    #[serde(rename = "FamilyDeletedEvent")]
    Deleted(FamilyDeleted),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FamilyCreated {
    pub name: String,
    pub principal_responsible_user_id: String,
    pub principal_role: FamilyRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberAdded {
    pub user_id: String,
    pub role: FamilyRole,
    pub responsibility: FamilyResponsibility,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberRemoved {
    pub user_id: String,
    pub removed_by: String,
    pub removed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberRoleChanged {
    pub user_id: String,
    pub old_role: FamilyRole,
    pub old_responsibility: FamilyResponsibility,
    pub new_role: FamilyRole,
    pub new_responsibility: FamilyResponsibility,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FamilyDeleted {
    pub name: String,
    pub deleted_at: DateTime<Utc>,
}

impl DomainEvent for FamilyEvent {
    const AGGREGATE_TYPE: &'static str = "Family";
    const CREATED_EVENT_TYPE: &'static str = "FamilyCreatedEvent";

    fn known_event_types() -> &'static [&'static str] {
        &[
            "FamilyCreatedEvent",
            "MemberAddedEvent",
            "MemberRemovedEvent",
            "MemberRoleChangedEvent",
            "FamilyDeletedEvent",
        ]
    }

    fn event_type(&self) -> &'static str {
        match self {
            FamilyEvent::Created(_) => "FamilyCreatedEvent",
            FamilyEvent::MemberAdded(_) => "MemberAddedEvent",
            FamilyEvent::MemberRemoved(_) => "MemberRemovedEvent",
            FamilyEvent::MemberRoleChanged(_) => "MemberRoleChangedEvent",
            FamilyEvent::Deleted(_) => "FamilyDeletedEvent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::{decode_payload, encode_payload};

    #[test]
    fn test_member_added_payload_shape() {
        let event = FamilyEvent::MemberAdded(MemberAdded {
            user_id: "u-2".to_string(),
            role: FamilyRole::Son,
            responsibility: FamilyResponsibility::Member,
            added_by: "u-1".to_string(),
            added_at: Utc::now(),
        });

        let payload = encode_payload(&event).unwrap();
        assert_eq!(payload["userId"], "u-2");
        assert_eq!(payload["role"], "SON");
        assert_eq!(payload["responsibility"], "MEMBER");

        let decoded: FamilyEvent = decode_payload("MemberAddedEvent", &payload).unwrap();
        assert_eq!(decoded, event);
    }
}
