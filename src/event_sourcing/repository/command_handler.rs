use super::aggregate_repository::{AggregateRepository, RepositoryError};
use crate::event_sourcing::core::Aggregate;
use crate::utils::{retry_on_transient, IsTransient, RetryConfig};

// ============================================================================
// Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → Event Store → Snapshot → Bus
//
// A version conflict is returned to the caller as-is. `handle_with_retry`
// is the explicit opt-in that reloads and reapplies the command.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CommandError<E: std::error::Error + 'static> {
    #[error("aggregate not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Domain(E),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl<E: std::error::Error + 'static> CommandError<E> {
    pub fn is_conflict(&self) -> bool {
        matches!(self, CommandError::Repository(err) if err.is_conflict())
    }
}

/// Only version conflicts are worth a reload-and-retry.
impl<E: std::error::Error + 'static> IsTransient for CommandError<E> {
    fn is_transient(&self) -> bool {
        self.is_conflict()
    }
}

pub struct CommandHandler<A: Aggregate> {
    repository: AggregateRepository<A>,
}

impl<A: Aggregate> CommandHandler<A> {
    pub fn new(repository: AggregateRepository<A>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &AggregateRepository<A> {
        &self.repository
    }

    /// Persist a freshly created aggregate. Fails with a conflict if the id is taken.
    pub async fn create(&self, mut aggregate: A) -> Result<A, CommandError<A::Error>> {
        self.repository
            .persist_snapshot_and_append_events(&mut aggregate)
            .await?;
        Ok(aggregate)
    }

    /// Load, execute, persist. Returns the new version.
    pub async fn handle(&self, aggregate_id: &str, command: &A::Command) -> Result<i64, CommandError<A::Error>> {
        let mut aggregate = self
            .repository
            .load(aggregate_id)
            .await?
            .ok_or_else(|| CommandError::NotFound(aggregate_id.to_string()))?;

        let emitted = aggregate.execute(command).map_err(CommandError::Domain)?;
        if emitted == 0 {
            return Ok(aggregate.version());
        }

        self.repository
            .persist_snapshot_and_append_events(&mut aggregate)
            .await?;

        Ok(aggregate.version())
    }

    /// Like `handle`, but on a version conflict discards the in-memory
    /// aggregate, reloads and reapplies the command.
    pub async fn handle_with_retry(
        &self,
        config: RetryConfig,
        aggregate_id: &str,
        command: &A::Command,
    ) -> Result<i64, CommandError<A::Error>> {
        retry_on_transient(config, move |attempt| {
            if attempt > 1 {
                tracing::info!(
                    aggregate_id = %aggregate_id,
                    attempt = attempt,
                    "Reapplying command after concurrent modification"
                );
            }
            self.handle(aggregate_id, command)
        })
        .await
        .into_result()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::aggregate::tests::{Counter, CounterError};
    use crate::event_sourcing::core::event::tests::{CounterEvent, CounterIncremented};
    use crate::event_sourcing::core::{Event, EventDecoder};
    use crate::event_sourcing::repository::aggregate_repository::tests::{counter_repository, RecordingBus};
    use crate::event_sourcing::repository::InMemorySnapshotStore;
    use crate::event_sourcing::store::{EventStore, EventStoreError, InMemoryEventStore};
    use crate::metrics::Metrics;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn handler() -> (CommandHandler<Counter>, InMemoryEventStore) {
        let (repository, store, _) = counter_repository(Arc::new(RecordingBus::default()));
        (CommandHandler::new(repository), store)
    }

    #[tokio::test]
    async fn test_handle_persists_new_version() {
        let (handler, store) = handler();
        handler.create(Counter::create("c-1", "dishes").unwrap()).await.unwrap();

        let version = handler.handle("c-1", &3).await.unwrap();

        assert_eq!(version, 2);
        assert_eq!(store.current_version("c-1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let (handler, _) = handler();
        handler.create(Counter::create("c-1", "dishes").unwrap()).await.unwrap();
        let err = handler.create(Counter::create("c-1", "again").unwrap()).await.unwrap_err();

        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_unknown_aggregate_is_not_found() {
        let (handler, _) = handler();
        let err = handler.handle("missing", &1).await.unwrap_err();
        assert!(matches!(err, CommandError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_domain_error_is_not_retried() {
        let (handler, store) = handler();
        handler.create(Counter::create("c-1", "dishes").unwrap()).await.unwrap();

        let err = handler
            .handle_with_retry(RetryConfig::conservative(), "c-1", &0)
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Domain(CounterError::NonPositive)));
        assert_eq!(store.current_version("c-1").await.unwrap(), 1);
    }

    /// Store where a rival writer lands one event right before the next append.
    struct RacingStore {
        inner: InMemoryEventStore,
        armed: AtomicBool,
        appends: AtomicUsize,
    }

    #[async_trait]
    impl EventStore for RacingStore {
        async fn append(&self, id: &str, events: &[Event], expected: i64) -> Result<(), EventStoreError> {
            self.appends.fetch_add(1, Ordering::SeqCst);
            if self.armed.swap(false, Ordering::SeqCst) {
                let rival = Event::new(id, &CounterEvent::Incremented(CounterIncremented { by: 100 }), expected + 1)
                    .map_err(|e| EventStoreError::Backend(e.into()))?;
                self.inner.append(id, &[rival], expected).await?;
            }
            self.inner.append(id, events, expected).await
        }

        async fn get_events(&self, id: &str) -> Result<Vec<Event>, EventStoreError> {
            self.inner.get_events(id).await
        }

        async fn get_all_events(&self) -> Result<Vec<Event>, EventStoreError> {
            self.inner.get_all_events().await
        }

        async fn current_version(&self, id: &str) -> Result<i64, EventStoreError> {
            self.inner.current_version(id).await
        }
    }

    #[tokio::test]
    async fn test_conflict_is_retried_after_reload() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let store = Arc::new(RacingStore {
            inner: InMemoryEventStore::new(EventDecoder::for_domain::<CounterEvent>()).with_metrics(metrics.clone()),
            armed: AtomicBool::new(false),
            appends: AtomicUsize::new(0),
        });
        let repository = AggregateRepository::new(
            store.clone(),
            Arc::new(InMemorySnapshotStore::<Counter>::new()),
            Arc::new(RecordingBus::default()),
        );
        let handler = CommandHandler::new(repository);
        handler.create(Counter::create("c-1", "dishes").unwrap()).await.unwrap();

        store.armed.store(true, Ordering::SeqCst);
        store.appends.store(0, Ordering::SeqCst);
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        };
        let version = handler.handle_with_retry(config, "c-1", &2).await.unwrap();

        assert_eq!(version, 3);
        assert_eq!(store.appends.load(Ordering::SeqCst), 2);
        assert_eq!(metrics.concurrency_conflicts_total.get(), 1);
        let counter = handler.repository().load("c-1").await.unwrap().unwrap();
        assert_eq!(counter.total, 102);
    }

    #[tokio::test]
    async fn test_conflict_without_retry_reaches_caller() {
        let store = Arc::new(RacingStore {
            inner: InMemoryEventStore::new(EventDecoder::for_domain::<CounterEvent>()),
            armed: AtomicBool::new(false),
            appends: AtomicUsize::new(0),
        });
        let repository = AggregateRepository::new(
            store.clone(),
            Arc::new(InMemorySnapshotStore::<Counter>::new()),
            Arc::new(RecordingBus::default()),
        );
        let handler = CommandHandler::new(repository);
        handler.create(Counter::create("c-1", "dishes").unwrap()).await.unwrap();

        store.armed.store(true, Ordering::SeqCst);
        let err = handler.handle("c-1", &2).await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(store.inner.current_version("c-1").await.unwrap(), 2);
    }
}
