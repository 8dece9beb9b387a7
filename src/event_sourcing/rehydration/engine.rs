use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::rehydrator::DynRehydrator;
use crate::event_sourcing::core::Event;
use crate::event_sourcing::store::{EventStore, EventStoreError};
use crate::metrics::Metrics;

// ============================================================================
// Aggregate Rehydration Engine
// ============================================================================
//
// Rebuilds the write-side snapshot store from the event log. The engine
// discovers, groups, orders and counts; rehydrators rebuild and persist.
//
// Two callers rehydrating the same aggregate id at once can both see
// "no snapshot" and both write one. Serialize such calls outside.
//
// ============================================================================

/// Aggregate id used for a failure that hit a whole type.
pub const ALL_AGGREGATES: &str = "ALL";

#[derive(Debug, thiserror::Error)]
pub enum RehydrationError {
    #[error("unsupported aggregate type {requested}: rehydrator handles {handled}")]
    UnsupportedAggregateType { requested: String, handled: String },

    #[error("no events for aggregate {aggregate_id}")]
    NoEvents { aggregate_id: String },

    #[error("aggregate {aggregate_id} is of type {actual}, not {expected}")]
    AggregateTypeMismatch {
        aggregate_id: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Store(#[from] EventStoreError),

    #[error("rehydration of {aggregate_id} failed: {source:#}")]
    Rehydrator {
        aggregate_id: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RehydrationOutcome {
    Rehydrated { version: i64 },
    /// A snapshot already existed; nothing was read or written.
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RehydrationFailure {
    pub aggregate_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RehydrationResult {
    pub aggregate_type: String,
    pub total: usize,
    pub rehydrated: usize,
    pub skipped: usize,
    pub errors: Vec<RehydrationFailure>,
}

impl RehydrationResult {
    fn empty(aggregate_type: &str) -> Self {
        Self {
            aggregate_type: aggregate_type.to_string(),
            total: 0,
            rehydrated: 0,
            skipped: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct RehydrationEngine {
    store: Arc<dyn EventStore>,
    metrics: Option<Arc<Metrics>>,
}

impl RehydrationEngine {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn rehydrate_one(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        rehydrator: &dyn DynRehydrator,
    ) -> Result<RehydrationOutcome, RehydrationError> {
        ensure_supported(aggregate_type, rehydrator)?;

        if self.snapshot_exists(aggregate_id, rehydrator).await? {
            tracing::info!(aggregate_id = %aggregate_id, "Snapshot already present, skipping");
            self.record(aggregate_type, "skipped");
            return Ok(RehydrationOutcome::AlreadyPresent);
        }

        let events = self.store.get_events(aggregate_id).await?;
        let Some(first) = events.first() else {
            return Err(RehydrationError::NoEvents {
                aggregate_id: aggregate_id.to_string(),
            });
        };

        if first.aggregate_type() != aggregate_type {
            return Err(RehydrationError::AggregateTypeMismatch {
                aggregate_id: aggregate_id.to_string(),
                expected: aggregate_type.to_string(),
                actual: first.aggregate_type().to_string(),
            });
        }

        let version = self.restore(aggregate_id, aggregate_type, &events, rehydrator).await?;
        Ok(RehydrationOutcome::Rehydrated { version })
    }

    pub async fn rehydrate_all_of_type(
        &self,
        aggregate_type: &str,
        rehydrator: &dyn DynRehydrator,
    ) -> Result<RehydrationResult, RehydrationError> {
        ensure_supported(aggregate_type, rehydrator)?;

        let events = self.store.get_all_events().await?;
        let groups = group_by_aggregate(events, aggregate_type);

        let mut result = RehydrationResult::empty(aggregate_type);
        result.total = groups.len();

        tracing::info!(
            aggregate_type = %aggregate_type,
            aggregates = groups.len(),
            "Starting rehydration of aggregate type"
        );

        for (aggregate_id, history) in groups {
            match self.snapshot_exists(&aggregate_id, rehydrator).await {
                Ok(true) => {
                    result.skipped += 1;
                    self.record(aggregate_type, "skipped");
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        aggregate_id = %aggregate_id,
                        aggregate_type = %aggregate_type,
                        error = %e,
                        "Snapshot lookup failed"
                    );
                    self.record(aggregate_type, "failed");
                    result.errors.push(RehydrationFailure {
                        aggregate_id,
                        error: e.to_string(),
                    });
                    continue;
                }
            }

            match self.restore(&aggregate_id, aggregate_type, &history, rehydrator).await {
                Ok(_) => result.rehydrated += 1,
                Err(e) => result.errors.push(RehydrationFailure {
                    aggregate_id,
                    error: e.to_string(),
                }),
            }
        }

        tracing::info!(
            aggregate_type = %aggregate_type,
            total = result.total,
            rehydrated = result.rehydrated,
            skipped = result.skipped,
            failed = result.errors.len(),
            "Rehydration of aggregate type finished"
        );
        Ok(result)
    }

    /// One result per rehydrator, even when a whole type fails.
    pub async fn rehydrate_all_types(&self, rehydrators: &[Arc<dyn DynRehydrator>]) -> Vec<RehydrationResult> {
        let mut results = Vec::with_capacity(rehydrators.len());

        for rehydrator in rehydrators {
            let aggregate_type = rehydrator.handled_type();
            match self.rehydrate_all_of_type(aggregate_type, rehydrator.as_ref()).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(
                        aggregate_type = %aggregate_type,
                        error = %e,
                        "Rehydration of aggregate type failed"
                    );
                    let mut result = RehydrationResult::empty(aggregate_type);
                    result.errors.push(RehydrationFailure {
                        aggregate_id: ALL_AGGREGATES.to_string(),
                        error: e.to_string(),
                    });
                    results.push(result);
                }
            }
        }

        results
    }

    async fn snapshot_exists(&self, aggregate_id: &str, rehydrator: &dyn DynRehydrator) -> Result<bool, RehydrationError> {
        rehydrator
            .snapshot_exists(aggregate_id)
            .await
            .map_err(|source| RehydrationError::Rehydrator {
                aggregate_id: aggregate_id.to_string(),
                source,
            })
    }

    async fn restore(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        events: &[Event],
        rehydrator: &dyn DynRehydrator,
    ) -> Result<i64, RehydrationError> {
        match rehydrator.restore(aggregate_id, events).await {
            Ok(version) => {
                tracing::info!(
                    aggregate_id = %aggregate_id,
                    aggregate_type = %aggregate_type,
                    version = version,
                    events = events.len(),
                    "Rehydrated aggregate"
                );
                self.record(aggregate_type, "rehydrated");
                Ok(version)
            }
            Err(source) => {
                tracing::error!(
                    aggregate_id = %aggregate_id,
                    aggregate_type = %aggregate_type,
                    error = %source,
                    "Failed to rehydrate aggregate"
                );
                self.record(aggregate_type, "failed");
                Err(RehydrationError::Rehydrator {
                    aggregate_id: aggregate_id.to_string(),
                    source,
                })
            }
        }
    }

    fn record(&self, aggregate_type: &str, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_rehydration(aggregate_type, outcome);
        }
    }
}

fn ensure_supported(aggregate_type: &str, rehydrator: &dyn DynRehydrator) -> Result<(), RehydrationError> {
    if rehydrator.handled_type() != aggregate_type {
        return Err(RehydrationError::UnsupportedAggregateType {
            requested: aggregate_type.to_string(),
            handled: rehydrator.handled_type().to_string(),
        });
    }
    Ok(())
}

/// Events of `aggregate_type` grouped per aggregate, groups in first-seen
/// order, each group sorted by version.
fn group_by_aggregate(events: Vec<Event>, aggregate_type: &str) -> Vec<(String, Vec<Event>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Event>)> = Vec::new();

    for event in events.into_iter().filter(|e| e.aggregate_type() == aggregate_type) {
        let slot = *index
            .entry(event.aggregate_id().to_string())
            .or_insert_with(|| {
                groups.push((event.aggregate_id().to_string(), Vec::new()));
                groups.len() - 1
            });
        groups[slot].1.push(event);
    }

    for (_, history) in &mut groups {
        history.sort_by_key(Event::version);
    }
    groups
}

// ============================================================================
// Unit Tests
// ============================================================================
