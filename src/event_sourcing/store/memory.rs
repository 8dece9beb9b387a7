use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::event_store::{check_append, EventStore, EventStoreError};
use crate::event_sourcing::core::{Event, EventDecoder, EventRecord};
use crate::metrics::Metrics;

/// Process-local event log.
///
/// The version check and the write happen under one write lock, which gives
/// the same at-most-one-writer guarantee as a unique `(aggregate_id, version)` index.
#[derive(Clone)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Vec<EventRecord>>>,
    decoder: EventDecoder,
    metrics: Option<Arc<Metrics>>,
}

impl InMemoryEventStore {
    pub fn new(decoder: EventDecoder) -> Self {
        Self {
            log: Arc::new(RwLock::new(Vec::new())),
            decoder,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Seed raw records, bypassing the concurrency check (imports, tests).
    pub async fn insert_records(&self, records: impl IntoIterator<Item = EventRecord>) {
        self.log.write().await.extend(records);
    }

    fn stored_version(log: &[EventRecord], aggregate_id: &str) -> i64 {
        log.iter()
            .filter(|record| record.aggregate_id == aggregate_id)
            .map(|record| record.version)
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        aggregate_id: &str,
        events: &[Event],
        expected_version: i64,
    ) -> Result<(), EventStoreError> {
        let mut log = self.log.write().await;
        let current_version = Self::stored_version(&log, aggregate_id);

        match check_append(aggregate_id, events, expected_version, current_version) {
            Ok(false) => return Ok(()),
            Ok(true) => {}
            Err(err) => {
                if err.is_conflict() {
                    tracing::warn!(
                        aggregate_id = %aggregate_id,
                        expected_version = expected_version,
                        actual_version = current_version,
                        "Concurrent modification detected"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_conflict();
                    }
                }
                return Err(err);
            }
        }

        log.extend(events.iter().map(Event::to_record));

        let new_version = expected_version + events.len() as i64;
        if let Some(metrics) = &self.metrics {
            metrics.record_append(events[0].aggregate_type(), events.len());
        }
        tracing::debug!(
            aggregate_id = %aggregate_id,
            new_version = new_version,
            event_count = events.len(),
            "Appended events to in-memory log"
        );

        Ok(())
    }

    async fn get_events(&self, aggregate_id: &str) -> Result<Vec<Event>, EventStoreError> {
        let mut records: Vec<EventRecord> = self
            .log
            .read()
            .await
            .iter()
            .filter(|record| record.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.version);

        Ok(self.decoder.decode_all(records))
    }

    async fn get_all_events(&self) -> Result<Vec<Event>, EventStoreError> {
        let mut records: Vec<EventRecord> = self.log.read().await.clone();
        // Stable: events with equal timestamps keep append order.
        records.sort_by_key(|record| record.occurred_on);

        Ok(self.decoder.decode_all(records))
    }

    async fn current_version(&self, aggregate_id: &str) -> Result<i64, EventStoreError> {
        Ok(Self::stored_version(&self.log.read().await, aggregate_id))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
