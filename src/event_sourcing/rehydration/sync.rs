use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use super::engine::{RehydrationError, ALL_AGGREGATES};
use super::rehydrator::DynRehydrator;
use crate::event_sourcing::core::Event;
use crate::event_sourcing::store::EventStore;

// ============================================================================
// Sync Verification - Snapshot Store vs Event Log
// ============================================================================
//
// Per aggregate type:
//
// - missingInWrite: a creation event exists but no snapshot (rehydrate it)
// - missingEvents:  a snapshot exists but the log has no creation event
//
// Read models live behind projections and are not inspected here.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSyncReport {
    pub aggregate_type: String,
    pub write_count: usize,
    pub events_count: usize,
    pub missing_in_write: Vec<String>,
    pub missing_events: Vec<String>,
}

impl TypeSyncReport {
    pub fn inconsistencies(&self) -> usize {
        self.missing_in_write.len() + self.missing_events.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub total_inconsistencies: usize,
    pub is_sync: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub types: Vec<TypeSyncReport>,
    pub summary: SyncSummary,
}

pub struct SyncVerifier {
    store: Arc<dyn EventStore>,
}

impl SyncVerifier {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// One pass over the log, one snapshot listing per rehydrator.
    pub async fn verify(&self, rehydrators: &[Arc<dyn DynRehydrator>]) -> Result<SyncReport, RehydrationError> {
        let events = self.store.get_all_events().await?;
        let mut types = Vec::with_capacity(rehydrators.len());

        for rehydrator in rehydrators {
            let snapshot_ids = rehydrator
                .snapshot_ids()
                .await
                .map_err(|source| RehydrationError::Rehydrator {
                    aggregate_id: ALL_AGGREGATES.to_string(),
                    source,
                })?;
            types.push(compare(rehydrator.as_ref(), &events, snapshot_ids));
        }

        let total_inconsistencies = types.iter().map(TypeSyncReport::inconsistencies).sum();
        let report = SyncReport {
            types,
            summary: SyncSummary {
                total_inconsistencies,
                is_sync: total_inconsistencies == 0,
            },
        };

        if report.summary.is_sync {
            tracing::info!("Snapshot store and event log are in sync");
        } else {
            tracing::warn!(
                inconsistencies = report.summary.total_inconsistencies,
                "Snapshot store and event log disagree"
            );
        }
        Ok(report)
    }
}

fn compare(rehydrator: &dyn DynRehydrator, events: &[Event], snapshot_ids: Vec<String>) -> TypeSyncReport {
    let aggregate_type = rehydrator.handled_type();
    let created_event_type = rehydrator.created_event_type();

    let of_type: Vec<&Event> = events
        .iter()
        .filter(|event| event.aggregate_type() == aggregate_type)
        .collect();
    let created: BTreeSet<&str> = of_type
        .iter()
        .filter(|event| event.event_type() == created_event_type)
        .map(|event| event.aggregate_id())
        .collect();
    let written: BTreeSet<&str> = snapshot_ids.iter().map(String::as_str).collect();

    TypeSyncReport {
        aggregate_type: aggregate_type.to_string(),
        write_count: written.len(),
        events_count: of_type.len(),
        missing_in_write: created.difference(&written).map(|id| id.to_string()).collect(),
        missing_events: written.difference(&created).map(|id| id.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::bus::ProjectionBus;
    use crate::event_sourcing::core::aggregate::tests::Counter;
    use crate::event_sourcing::core::event::tests::CounterEvent;
    use crate::event_sourcing::core::{Aggregate, EventDecoder};
    use crate::event_sourcing::rehydration::SnapshotRehydrator;
    use crate::event_sourcing::repository::{AggregateRepository, InMemorySnapshotStore, SnapshotStore};
    use crate::event_sourcing::store::InMemoryEventStore;

    #[tokio::test]
    async fn test_reports_both_directions_of_drift() {
        let store = InMemoryEventStore::new(EventDecoder::for_domain::<CounterEvent>());
        let snapshots = InMemorySnapshotStore::<Counter>::new();
        let repository = AggregateRepository::new(
            Arc::new(store.clone()),
            Arc::new(snapshots.clone()),
            Arc::new(ProjectionBus::new()),
        );

        let mut synced = Counter::create("synced", "a").unwrap();
        synced.execute(&1).unwrap();
        repository.persist_snapshot_and_append_events(&mut synced).await.unwrap();

        let mut lost = Counter::create("lost-snapshot", "b").unwrap();
        repository.persist_snapshot_and_append_events(&mut lost).await.unwrap();
        assert!(snapshots.remove("lost-snapshot").await);

        snapshots.save(&Counter::create("orphan", "c").unwrap()).await.unwrap();

        let rehydrators: Vec<Arc<dyn DynRehydrator>> = vec![Arc::new(SnapshotRehydrator::new(repository))];
        let report = SyncVerifier::new(Arc::new(store)).verify(&rehydrators).await.unwrap();

        assert_eq!(
            report.types[0],
            TypeSyncReport {
                aggregate_type: "Counter".to_string(),
                write_count: 2,
                events_count: 3,
                missing_in_write: vec!["lost-snapshot".to_string()],
                missing_events: vec!["orphan".to_string()],
            }
        );
        assert_eq!(report.summary.total_inconsistencies, 2);
        assert!(!report.summary.is_sync);
    }

    #[tokio::test]
    async fn test_empty_stores_are_in_sync() {
        let store = InMemoryEventStore::new(EventDecoder::for_domain::<CounterEvent>());
        let repository = AggregateRepository::<Counter>::new(
            Arc::new(store.clone()),
            Arc::new(InMemorySnapshotStore::<Counter>::new()),
            Arc::new(ProjectionBus::new()),
        );

        let rehydrators: Vec<Arc<dyn DynRehydrator>> = vec![Arc::new(SnapshotRehydrator::new(repository))];
        let report = SyncVerifier::new(Arc::new(store)).verify(&rehydrators).await.unwrap();

        assert_eq!(report.types[0].write_count, 0);
        assert!(report.summary.is_sync);
    }
}
