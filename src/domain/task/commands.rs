use chrono::{DateTime, Utc};

use super::value_objects::TaskStatus;

// ============================================================================
// Task Commands - Represent user intent
// ============================================================================

/// Input for `TaskAggregate::create`.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub family_id: String,
    pub assigned_to: Vec<String>,
    pub assigned_by: String,
    pub due_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub enum TaskCommand {
    UpdateDetails {
        title: Option<String>,
        description: Option<String>,
        due_date: Option<DateTime<Utc>>,
        location: Option<String>,
        updated_by: String,
    },
    ChangeStatus {
        new_status: TaskStatus,
        changed_by: String,
    },
    AssignUser {
        user_id: String,
        assigned_by: String,
    },
    UnassignUser {
        user_id: String,
        removed_by: String,
    },
    DeleteTask,
}
