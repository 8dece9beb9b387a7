// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================
//
// The append-only log behind one trait, with an in-process and a ScyllaDB
// backend. Both decode through an injected `EventDecoder`.
//
// ============================================================================

pub mod event_store;
pub mod memory;
pub mod scylla_store;

pub use event_store::{check_append, EventStore, EventStoreError};
pub use memory::InMemoryEventStore;
pub use scylla_store::ScyllaEventStore;
