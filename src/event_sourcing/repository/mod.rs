// ============================================================================
// Write Side - Snapshots, Repository, Command Handling
// ============================================================================

pub mod aggregate_repository;
pub mod command_handler;
pub mod snapshot;

pub use aggregate_repository::{AggregateRepository, RepositoryError};
pub use command_handler::{CommandError, CommandHandler};
pub use snapshot::{InMemorySnapshotStore, ScyllaSnapshotStore, SnapshotStore};
