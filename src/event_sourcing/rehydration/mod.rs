// ============================================================================
// Aggregate Rehydration - Rebuilding Snapshots from the Log
// ============================================================================

pub mod engine;
pub mod rehydrator;
pub mod sync;

pub use engine::{
    RehydrationEngine, RehydrationError, RehydrationFailure, RehydrationOutcome, RehydrationResult,
    ALL_AGGREGATES,
};
pub use rehydrator::{DynRehydrator, Rehydrator, SnapshotRehydrator};
pub use sync::{SyncReport, SyncSummary, SyncVerifier, TypeSyncReport};
