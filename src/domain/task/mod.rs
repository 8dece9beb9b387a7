// ============================================================================
// Task Domain - Business Logic for Task Aggregate
// ============================================================================
//
// This module contains ALL Task-specific code:
// - Value objects (TaskStatus and its transition table)
// - Events (TaskCreatedEvent, TaskStatusChangedEvent, etc.)
// - Commands (NewTask, TaskCommand)
// - Errors (TaskError enum)
// - Aggregate (TaskAggregate with business logic)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;

pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;

use crate::event_sourcing::core::DomainRegistry;
use crate::event_sourcing::rehydration::SnapshotRehydrator;

/// Every task field is derivable from its events.
pub type TaskRehydrator = SnapshotRehydrator<TaskAggregate>;

pub fn registry() -> DomainRegistry<TaskEvent> {
    DomainRegistry::new()
}
