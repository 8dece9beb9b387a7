use async_trait::async_trait;

use crate::event_sourcing::core::{Aggregate, DomainEvent, Event};
use crate::event_sourcing::repository::AggregateRepository;

/// Per-type reconstruction and persistence, supplied by a domain.
///
/// Fields that never appear in events (credential hashes) are the
/// rehydrator's problem, not the engine's.
#[async_trait]
pub trait Rehydrator: Send + Sync {
    type Aggregate: Aggregate;

    fn aggregate_type(&self) -> &str;

    async fn check_exists(&self, aggregate_id: &str) -> anyhow::Result<bool>;

    /// `events` is sorted by version; the first one is the creation event.
    async fn rehydrate_aggregate(&self, aggregate_id: &str, events: &[Event]) -> anyhow::Result<Self::Aggregate>;

    /// Snapshot write only: no append, no publish.
    async fn save_without_events(&self, aggregate: &Self::Aggregate) -> anyhow::Result<()>;

    /// Ids present in the write-side store, for sync checks.
    async fn list_snapshot_ids(&self) -> anyhow::Result<Vec<String>>;
}

/// Object-safe view of a `Rehydrator`, so rehydrators of different
/// aggregate types can share one list.
#[async_trait]
pub trait DynRehydrator: Send + Sync {
    fn handled_type(&self) -> &str;

    /// Tag of the event that starts every stream of the handled type.
    fn created_event_type(&self) -> &str;

    async fn snapshot_exists(&self, aggregate_id: &str) -> anyhow::Result<bool>;

    /// Rebuild and save; returns the version of the restored aggregate.
    async fn restore(&self, aggregate_id: &str, events: &[Event]) -> anyhow::Result<i64>;

    async fn snapshot_ids(&self) -> anyhow::Result<Vec<String>>;
}

#[async_trait]
impl<R: Rehydrator> DynRehydrator for R {
    fn handled_type(&self) -> &str {
        self.aggregate_type()
    }

    fn created_event_type(&self) -> &str {
        <<R::Aggregate as Aggregate>::Event as DomainEvent>::CREATED_EVENT_TYPE
    }

    async fn snapshot_exists(&self, aggregate_id: &str) -> anyhow::Result<bool> {
        self.check_exists(aggregate_id).await
    }

    async fn restore(&self, aggregate_id: &str, events: &[Event]) -> anyhow::Result<i64> {
        let aggregate = self.rehydrate_aggregate(aggregate_id, events).await?;
        self.save_without_events(&aggregate).await?;
        Ok(aggregate.version())
    }

    async fn snapshot_ids(&self) -> anyhow::Result<Vec<String>> {
        self.list_snapshot_ids().await
    }
}

/// Rehydrator for aggregates whose whole state is derivable from events.
pub struct SnapshotRehydrator<A: Aggregate> {
    repository: AggregateRepository<A>,
}

impl<A: Aggregate> SnapshotRehydrator<A> {
    pub fn new(repository: AggregateRepository<A>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<A: Aggregate + 'static> Rehydrator for SnapshotRehydrator<A> {
    type Aggregate = A;

    fn aggregate_type(&self) -> &str {
        A::aggregate_type()
    }

    async fn check_exists(&self, aggregate_id: &str) -> anyhow::Result<bool> {
        Ok(self.repository.exists(aggregate_id).await?)
    }

    async fn rehydrate_aggregate(&self, aggregate_id: &str, events: &[Event]) -> anyhow::Result<A> {
        Ok(A::rebuild_from_events(aggregate_id, events)?)
    }

    async fn save_without_events(&self, aggregate: &A) -> anyhow::Result<()> {
        Ok(self.repository.persist_snapshot_only(aggregate).await?)
    }

    async fn list_snapshot_ids(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.repository.snapshot_ids().await?)
    }
}
