use async_trait::async_trait;

use crate::event_sourcing::core::Event;
use crate::utils::IsTransient;

// ============================================================================
// Event Store - Append-Only Log with Optimistic Concurrency
// ============================================================================
//
// Responsibilities:
// 1. Append events per aggregate (append-only, no updates, no deletes)
// 2. Load event history for one aggregate, ordered by version
// 3. Load the whole log, ordered by occurred_on
// 4. Reject stale writers (expected version must equal stored version)
//
// The store never retries a rejected append. Callers reload and retry.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error(
        "concurrent modification of aggregate {aggregate_id}: expected version {expected_version}, actual version {actual_version}"
    )]
    ConcurrentModification {
        aggregate_id: String,
        expected_version: i64,
        actual_version: i64,
    },

    #[error("event store backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

impl EventStoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrentModification { .. })
    }
}

/// A conflict is cured by reloading and reapplying; backend failures are not
/// retried at this level.
impl IsTransient for EventStoreError {
    fn is_transient(&self) -> bool {
        self.is_conflict()
    }
}

/// Validate an append batch against the currently stored version.
///
/// Returns `Ok(false)` for an empty batch (nothing to write).
pub fn check_append(
    aggregate_id: &str,
    events: &[Event],
    expected_version: i64,
    current_version: i64,
) -> Result<bool, EventStoreError> {
    let Some(first) = events.first() else {
        return Ok(false);
    };

    if current_version != expected_version {
        return Err(EventStoreError::ConcurrentModification {
            aggregate_id: aggregate_id.to_string(),
            expected_version,
            actual_version: current_version,
        });
    }

    if first.version() != expected_version + 1 {
        return Err(EventStoreError::ConcurrentModification {
            aggregate_id: aggregate_id.to_string(),
            expected_version,
            actual_version: first.version() - 1,
        });
    }

    for (offset, event) in events.iter().enumerate() {
        if event.aggregate_id() != aggregate_id {
            return Err(EventStoreError::Backend(anyhow::anyhow!(
                "event for aggregate {} in append batch for {}",
                event.aggregate_id(),
                aggregate_id
            )));
        }

        let wanted = expected_version + 1 + offset as i64;
        if event.version() != wanted {
            return Err(EventStoreError::ConcurrentModification {
                aggregate_id: aggregate_id.to_string(),
                expected_version: wanted - 1,
                actual_version: event.version(),
            });
        }
    }

    Ok(true)
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append `events` if the stored version equals `expected_version`.
    /// An empty batch succeeds without touching storage.
    async fn append(
        &self,
        aggregate_id: &str,
        events: &[Event],
        expected_version: i64,
    ) -> Result<(), EventStoreError>;

    /// Events of one aggregate in ascending version order; empty if none.
    async fn get_events(&self, aggregate_id: &str) -> Result<Vec<Event>, EventStoreError>;

    /// Every stored event in ascending `occurred_on` order.
    async fn get_all_events(&self) -> Result<Vec<Event>, EventStoreError>;

    /// Highest stored version for the aggregate, 0 if none.
    async fn current_version(&self, aggregate_id: &str) -> Result<i64, EventStoreError>;

    async fn aggregate_exists(&self, aggregate_id: &str) -> Result<bool, EventStoreError> {
        Ok(self.current_version(aggregate_id).await? > 0)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
