// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Generic, reusable event sourcing engine.
// Domain-specific code is in src/domain/
//
// ============================================================================

// Core abstractions (GENERIC - works with any aggregate)
pub mod core;
pub mod store;

// Read side hand-off and batch operations
pub mod bus;
pub mod rehydration;
pub mod replay;

// Write side
pub mod repository;

pub use self::core::*;
pub use bus::{EventBus, Projection, ProjectionBus};
pub use rehydration::*;
pub use replay::{EventReplayer, ReplayFailure, ReplayProgress};
pub use repository::*;
pub use store::*;
