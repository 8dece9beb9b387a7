use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::bus::EventBus;
use super::core::Event;
use super::store::EventStore;
use crate::metrics::Metrics;

// ============================================================================
// Event Replayer
// ============================================================================
//
// Re-publishes stored events to the read side. Business logic is not run.
//
// - Order is exactly what the store returns; nothing is reordered or deduplicated
// - A failed publish is recorded and the loop moves on
// - Only a failed fetch aborts the run
//
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayFailure {
    pub event: Event,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayProgress {
    pub total_events: usize,
    pub processed_events: usize,
    pub failed_events: usize,
    pub errors: Vec<ReplayFailure>,
}

impl ReplayProgress {
    /// True when every event was published.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct EventReplayer {
    store: Arc<dyn EventStore>,
    bus: Arc<dyn EventBus>,
    metrics: Option<Arc<Metrics>>,
}

impl EventReplayer {
    pub fn new(store: Arc<dyn EventStore>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            store,
            bus,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn replay_all(&self) -> anyhow::Result<ReplayProgress> {
        tracing::info!("Starting replay of all events");
        let events = self.store.get_all_events().await?;
        Ok(self.publish_all("all", events).await)
    }

    pub async fn replay_aggregate(&self, aggregate_id: &str) -> anyhow::Result<ReplayProgress> {
        tracing::info!(aggregate_id = %aggregate_id, "Starting replay of aggregate");
        let events = self.store.get_events(aggregate_id).await?;
        Ok(self.publish_all("aggregate", events).await)
    }

    /// Events strictly after `timestamp`.
    pub async fn replay_after(&self, timestamp: DateTime<Utc>) -> anyhow::Result<ReplayProgress> {
        tracing::info!(after = %timestamp, "Starting incremental replay");
        let events: Vec<Event> = self
            .store
            .get_all_events()
            .await?
            .into_iter()
            .filter(|event| event.occurred_on() > timestamp)
            .collect();
        Ok(self.publish_all("after", events).await)
    }

    async fn publish_all(&self, mode: &str, events: Vec<Event>) -> ReplayProgress {
        let started = Instant::now();
        let mut progress = ReplayProgress {
            total_events: events.len(),
            ..ReplayProgress::default()
        };

        for event in events {
            match self.bus.publish(&event).await {
                Ok(()) => {
                    progress.processed_events += 1;
                    self.record(true);
                }
                Err(e) => {
                    tracing::error!(
                        aggregate_id = %event.aggregate_id(),
                        event_type = %event.event_type(),
                        version = event.version(),
                        error = %e,
                        "Failed to replay event"
                    );
                    progress.failed_events += 1;
                    progress.errors.push(ReplayFailure {
                        event,
                        error: format!("{e:#}"),
                    });
                    self.record(false);
                }
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        if let Some(metrics) = &self.metrics {
            metrics.record_replay_duration(mode, elapsed);
        }
        tracing::info!(
            mode = mode,
            total = progress.total_events,
            processed = progress.processed_events,
            failed = progress.failed_events,
            elapsed_secs = elapsed,
            "Replay finished"
        );

        progress
    }

    fn record(&self, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_replay_event(success);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
