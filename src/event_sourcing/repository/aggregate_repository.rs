use std::sync::Arc;

use super::snapshot::SnapshotStore;
use crate::event_sourcing::bus::EventBus;
use crate::event_sourcing::core::{Aggregate, Event};
use crate::event_sourcing::store::{EventStore, EventStoreError};

// ============================================================================
// Aggregate Repository - Write Paths
// ============================================================================
//
// Two explicit write paths:
//
// - persist_snapshot_and_append_events: normal command path. Appends the
//   uncommitted events under optimistic concurrency, then writes the
//   snapshot, marks the events committed and publishes them.
// - persist_snapshot_only: rehydration path. No append, no publish.
//
// The snapshot is written only after the log accepted the events, so a
// writer that loses the version race never overwrites the winner's state.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] EventStoreError),

    #[error("snapshot store failure for {aggregate_id}: {source}")]
    Snapshot {
        aggregate_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("events of {aggregate_id} committed but publishing failed: {source}")]
    Publish {
        aggregate_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("aggregate {aggregate_id} could not be brought up to date: {message}")]
    CatchUp { aggregate_id: String, message: String },
}

impl RepositoryError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::Store(err) if err.is_conflict())
    }
}

pub struct AggregateRepository<A: Aggregate> {
    store: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotStore<A>>,
    bus: Arc<dyn EventBus>,
}

impl<A: Aggregate> Clone for AggregateRepository<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            snapshots: self.snapshots.clone(),
            bus: self.bus.clone(),
        }
    }
}

impl<A: Aggregate> AggregateRepository<A> {
    pub fn new(
        store: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore<A>>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            store,
            snapshots,
            bus,
        }
    }

    /// Snapshot, brought up to date with any events stored after it.
    /// Without a snapshot the aggregate is rebuilt from the event log.
    pub async fn load(&self, aggregate_id: &str) -> Result<Option<A>, RepositoryError> {
        let snapshot = self
            .snapshots
            .load(aggregate_id)
            .await
            .map_err(|source| RepositoryError::Snapshot {
                aggregate_id: aggregate_id.to_string(),
                source,
            })?;

        let Some(mut aggregate) = snapshot else {
            return self.rebuild_from_log(aggregate_id).await;
        };

        let snapshot_version = aggregate.version();
        if self.store.current_version(aggregate_id).await? > snapshot_version {
            let tail: Vec<Event> = self
                .store
                .get_events(aggregate_id)
                .await?
                .into_iter()
                .filter(|event| event.version() > snapshot_version)
                .collect();

            tracing::debug!(
                aggregate_id = %aggregate_id,
                snapshot_version = snapshot_version,
                missing = tail.len(),
                "Snapshot behind event log, catching up"
            );
            aggregate
                .load_from_history(&tail)
                .map_err(|e| RepositoryError::CatchUp {
                    aggregate_id: aggregate_id.to_string(),
                    message: e.to_string(),
                })?;
        }

        Ok(Some(aggregate))
    }

    async fn rebuild_from_log(&self, aggregate_id: &str) -> Result<Option<A>, RepositoryError> {
        let history = self.store.get_events(aggregate_id).await?;
        if history.is_empty() {
            return Ok(None);
        }

        tracing::warn!(
            aggregate_id = %aggregate_id,
            events = history.len(),
            "No snapshot for stored aggregate, rebuilding from event log"
        );
        let aggregate = A::rebuild_from_events(aggregate_id, &history).map_err(|e| RepositoryError::CatchUp {
            aggregate_id: aggregate_id.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(aggregate))
    }

    pub async fn exists(&self, aggregate_id: &str) -> Result<bool, RepositoryError> {
        self.snapshots
            .exists(aggregate_id)
            .await
            .map_err(|source| RepositoryError::Snapshot {
                aggregate_id: aggregate_id.to_string(),
                source,
            })
    }

    pub async fn snapshot_ids(&self) -> Result<Vec<String>, RepositoryError> {
        self.snapshots
            .list_ids()
            .await
            .map_err(|source| RepositoryError::Snapshot {
                aggregate_id: A::aggregate_type().to_string(),
                source,
            })
    }

    /// Rehydration path: the events are already in the log.
    pub async fn persist_snapshot_only(&self, aggregate: &A) -> Result<(), RepositoryError> {
        self.save_snapshot(aggregate).await?;
        tracing::info!(
            aggregate_id = %aggregate.aggregate_id(),
            aggregate_type = %A::aggregate_type(),
            version = aggregate.version(),
            "Persisted snapshot without events"
        );
        Ok(())
    }

    /// Normal path. On a failed append nothing is written and the
    /// uncommitted events stay on the aggregate.
    pub async fn persist_snapshot_and_append_events(&self, aggregate: &mut A) -> Result<(), RepositoryError> {
        let aggregate_id = aggregate.aggregate_id().to_string();
        let pending: Vec<Event> = aggregate.root().uncommitted_events().to_vec();
        let expected_version = aggregate.version() - pending.len() as i64;

        self.store.append(&aggregate_id, &pending, expected_version).await?;
        self.save_snapshot(aggregate).await?;
        aggregate.root_mut().mark_events_committed();

        for event in &pending {
            if let Err(source) = self.bus.publish(event).await {
                tracing::error!(
                    aggregate_id = %aggregate_id,
                    event_type = %event.event_type(),
                    version = event.version(),
                    error = %source,
                    "Publish failed after append; replay will resynchronise projections"
                );
                return Err(RepositoryError::Publish { aggregate_id, source });
            }
        }

        tracing::info!(
            aggregate_id = %aggregate_id,
            aggregate_type = %A::aggregate_type(),
            new_version = aggregate.version(),
            event_count = pending.len(),
            "Persisted aggregate"
        );
        Ok(())
    }

    async fn save_snapshot(&self, aggregate: &A) -> Result<(), RepositoryError> {
        self.snapshots
            .save(aggregate)
            .await
            .map_err(|source| RepositoryError::Snapshot {
                aggregate_id: aggregate.aggregate_id().to_string(),
                source,
            })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
