// ============================================================================
// User Domain - Business Logic for User Aggregate
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod rehydrator;

pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use rehydrator::*;

use crate::event_sourcing::core::DomainRegistry;

pub fn registry() -> DomainRegistry<UserEvent> {
    DomainRegistry::new()
}
