use super::value_objects::TaskStatus;
use crate::event_sourcing::core::EventError;

// ============================================================================
// Task Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task title cannot be empty")]
    EmptyTitle,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: TaskStatus, to: TaskStatus },

    #[error("User is already assigned to this task: {0}")]
    AlreadyAssigned(String),

    #[error("User is not assigned to this task: {0}")]
    NotAssigned(String),

    #[error("Task has been deleted")]
    Deleted,

    #[error(transparent)]
    Event(#[from] EventError),
}
