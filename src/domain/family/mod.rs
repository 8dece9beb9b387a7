// ============================================================================
// Family Domain - Business Logic for Family Aggregate
// ============================================================================
//
// Membership bookkeeping only: who belongs to the family, with which role
// and responsibility. Role hierarchy permissions live outside this crate.
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

pub type FamilyRehydrator = SnapshotRehydrator<FamilyAggregate>;

pub fn registry() -> DomainRegistry<FamilyEvent> {
    DomainRegistry::new()
}
