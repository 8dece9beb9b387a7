use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::TaskStatus;
use crate::event_sourcing::core::DomainEvent;

// ============================================================================
// Task Domain Events
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event_type", content = "payload")]
pub enum TaskEvent {
    #[serde(rename = "TaskCreatedEvent")]
    Created(TaskCreated),
    #[serde(rename = "TaskUpdatedEvent")]
    Updated(TaskUpdated),
    #[serde(rename = "TaskStatusChangedEvent")]
    StatusChanged(TaskStatusChanged),
    #[serde(rename = "TaskAssignmentAddedEvent")]
    AssignmentAdded(TaskAssignmentAdded),
    #[serde(rename = "TaskAssignmentRemovedEvent")]
    AssignmentRemoved(TaskAssignmentRemoved),
    #[serde(rename = "TaskDeletedEvent")]
    Deleted(TaskDeleted),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreated {
    pub title: String,
    pub description: String,
    pub family_id: String,
    pub assigned_to: Vec<String>,
    pub assigned_by: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Only the fields that changed are set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdated {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusChanged {
    pub old_status: TaskStatus,
    pub new_status: TaskStatus,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignmentAdded {
    pub assigned_to: String,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignmentRemoved {
    pub assigned_to: String,
    pub removed_by: String,
    pub removed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeleted {
    pub title: String,
    pub family_id: String,
    pub deleted_at: DateTime<Utc>,
}

impl DomainEvent for TaskEvent {
    const AGGREGATE_TYPE: &'static str = "Task";
    const CREATED_EVENT_TYPE: &'static str = "TaskCreatedEvent";

    fn known_event_types() -> &'static [&'static str] {
        &[
            "TaskCreatedEvent",
            "TaskUpdatedEvent",
            "TaskStatusChangedEvent",
            "TaskAssignmentAddedEvent",
            "TaskAssignmentRemovedEvent",
            "TaskDeletedEvent",
        ]
    }

    fn event_type(&self) -> &'static str {
        match self {
            TaskEvent::Created(_) => "TaskCreatedEvent",
            TaskEvent::Updated(_) => "TaskUpdatedEvent",
            TaskEvent::StatusChanged(_) => "TaskStatusChangedEvent",
            TaskEvent::AssignmentAdded(_) => "TaskAssignmentAddedEvent",
            TaskEvent::AssignmentRemoved(_) => "TaskAssignmentRemovedEvent",
            TaskEvent::Deleted(_) => "TaskDeletedEvent",
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::{decode_payload, encode_payload};

    #[test]
    fn test_status_changed_payload_shape() {
        let event = TaskEvent::StatusChanged(TaskStatusChanged {
            old_status: TaskStatus::Pending,
            new_status: TaskStatus::InProgress,
            changed_by: "u-1".to_string(),
            changed_at: Utc::now(),
        });

        let payload = encode_payload(&event).unwrap();
        assert_eq!(payload["oldStatus"], "PENDING");
        assert_eq!(payload["newStatus"], "IN_PROGRESS");
        assert_eq!(payload["changedBy"], "u-1");

        let decoded: TaskEvent = decode_payload("TaskStatusChangedEvent", &payload).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_created_payload_tolerates_missing_optionals() {
        let payload = serde_json::json!({
            "title": "Take out trash",
            "description": "",
            "familyId": "f-1",
            "assignedTo": ["u-2"],
            "assignedBy": "u-1",
            "createdAt": "2024-03-01T10:00:00Z"
        });

        let decoded: TaskEvent = decode_payload("TaskCreatedEvent", &payload).unwrap();
        match decoded {
            TaskEvent::Created(created) => {
                assert_eq!(created.assigned_to, vec!["u-2".to_string()]);
                assert!(created.due_date.is_none());
                assert!(created.location.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_every_variant_tag_is_known() {
        let deleted = TaskEvent::Deleted(TaskDeleted {
            title: "t".to_string(),
            family_id: "f".to_string(),
            deleted_at: Utc::now(),
        });
        assert!(TaskEvent::known_event_types().contains(&deleted.event_type()));
        assert_eq!(TaskEvent::known_event_types().len(), 6);
    }
}
