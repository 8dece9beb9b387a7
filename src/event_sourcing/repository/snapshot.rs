use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use scylla::client::session::Session;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::event_sourcing::core::Aggregate;

// ============================================================================
// Snapshot Stores - Write-Side State
// ============================================================================
//
// Current state of each aggregate, stored as JSON. Uncommitted events are not
// part of a snapshot.
//
// ============================================================================

#[async_trait]
pub trait SnapshotStore<A>: Send + Sync {
    async fn load(&self, aggregate_id: &str) -> anyhow::Result<Option<A>>;

    async fn exists(&self, aggregate_id: &str) -> anyhow::Result<bool>;

    /// Insert or replace.
    async fn save(&self, aggregate: &A) -> anyhow::Result<()>;

    /// Ids of every stored snapshot of this aggregate type, sorted.
    async fn list_ids(&self) -> anyhow::Result<Vec<String>>;
}

pub struct InMemorySnapshotStore<A> {
    snapshots: Arc<RwLock<HashMap<String, Value>>>,
    _phantom: PhantomData<fn() -> A>,
}

impl<A> InMemorySnapshotStore<A> {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(RwLock::new(HashMap::new())),
            _phantom: PhantomData,
        }
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn remove(&self, aggregate_id: &str) -> bool {
        self.snapshots.write().await.remove(aggregate_id).is_some()
    }
}

impl<A> Default for InMemorySnapshotStore<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for InMemorySnapshotStore<A> {
    fn clone(&self) -> Self {
        Self {
            snapshots: self.snapshots.clone(),
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<A> SnapshotStore<A> for InMemorySnapshotStore<A>
where
    A: Aggregate + Serialize + DeserializeOwned + 'static,
{
    async fn load(&self, aggregate_id: &str) -> anyhow::Result<Option<A>> {
        match self.snapshots.read().await.get(aggregate_id) {
            Some(state) => Ok(Some(serde_json::from_value(state.clone())?)),
            None => Ok(None),
        }
    }

    async fn exists(&self, aggregate_id: &str) -> anyhow::Result<bool> {
        Ok(self.snapshots.read().await.contains_key(aggregate_id))
    }

    async fn save(&self, aggregate: &A) -> anyhow::Result<()> {
        let state = serde_json::to_value(aggregate)?;
        self.snapshots
            .write()
            .await
            .insert(aggregate.aggregate_id().to_string(), state);
        Ok(())
    }

    async fn list_ids(&self) -> anyhow::Result<Vec<String>> {
        let mut ids: Vec<String> = self.snapshots.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

// ============================================================================
// ScyllaDB Snapshot Store
// ============================================================================

const CREATE_SNAPSHOTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS aggregate_snapshots (
    aggregate_type text,
    aggregate_id text,
    version bigint,
    state text,
    updated_at timestamp,
    PRIMARY KEY ((aggregate_type, aggregate_id))
)";

pub struct ScyllaSnapshotStore<A> {
    session: Arc<Session>,
    _phantom: PhantomData<fn() -> A>,
}

impl<A: Aggregate> ScyllaSnapshotStore<A> {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            _phantom: PhantomData,
        }
    }

    pub async fn ensure_schema(session: &Session) -> anyhow::Result<()> {
        session.query_unpaged(CREATE_SNAPSHOTS_TABLE, &[]).await?;
        Ok(())
    }
}

#[async_trait]
impl<A> SnapshotStore<A> for ScyllaSnapshotStore<A>
where
    A: Aggregate + Serialize + DeserializeOwned + 'static,
{
    async fn load(&self, aggregate_id: &str) -> anyhow::Result<Option<A>> {
        let result = self
            .session
            .query_unpaged(
                "SELECT state FROM aggregate_snapshots WHERE aggregate_type = ? AND aggregate_id = ?",
                (A::aggregate_type(), aggregate_id),
            )
            .await?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None),
        };

        match rows_result.maybe_first_row::<(String,)>()? {
            Some((state,)) => {
                let aggregate = serde_json::from_str(&state)
                    .with_context(|| format!("corrupt snapshot for {aggregate_id}"))?;
                Ok(Some(aggregate))
            }
            None => Ok(None),
        }
    }

    async fn exists(&self, aggregate_id: &str) -> anyhow::Result<bool> {
        let result = self
            .session
            .query_unpaged(
                "SELECT version FROM aggregate_snapshots WHERE aggregate_type = ? AND aggregate_id = ?",
                (A::aggregate_type(), aggregate_id),
            )
            .await?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(false),
        };
        Ok(rows_result.maybe_first_row::<(i64,)>()?.is_some())
    }

    async fn save(&self, aggregate: &A) -> anyhow::Result<()> {
        let state = serde_json::to_string(aggregate)?;
        let updated_at: DateTime<Utc> = aggregate.root().updated_at();

        self.session
            .query_unpaged(
                "INSERT INTO aggregate_snapshots (aggregate_type, aggregate_id, version, state, updated_at)
                 VALUES (?, ?, ?, ?, ?)",
                (
                    A::aggregate_type(),
                    aggregate.aggregate_id(),
                    aggregate.version(),
                    state,
                    updated_at,
                ),
            )
            .await?;

        tracing::debug!(
            aggregate_id = %aggregate.aggregate_id(),
            aggregate_type = %A::aggregate_type(),
            version = aggregate.version(),
            "Saved snapshot"
        );
        Ok(())
    }

    async fn list_ids(&self) -> anyhow::Result<Vec<String>> {
        let rows: Vec<(String,)> = self
            .session
            .query_iter(
                "SELECT aggregate_id FROM aggregate_snapshots WHERE aggregate_type = ? ALLOW FILTERING",
                (A::aggregate_type(),),
            )
            .await?
            .rows_stream::<(String,)>()?
            .try_collect()
            .await?;

        let mut ids: Vec<String> = rows.into_iter().map(|(id,)| id).collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::aggregate::tests::Counter;

    #[tokio::test]
    async fn test_snapshot_round_trip_drops_uncommitted_events() {
        let store = InMemorySnapshotStore::<Counter>::new();
        let mut counter = Counter::create("c-1", "dishes").unwrap();
        counter.execute(&3).unwrap();

        store.save(&counter).await.unwrap();
        let loaded = store.load("c-1").await.unwrap().unwrap();

        assert_eq!(loaded.version(), 2);
        assert_eq!(loaded.total, 3);
        assert!(loaded.root().uncommitted_events().is_empty());
    }

    #[tokio::test]
    async fn test_exists_and_missing() {
        let store = InMemorySnapshotStore::<Counter>::new();
        store.save(&Counter::create("c-1", "x").unwrap()).await.unwrap();

        assert!(store.exists("c-1").await.unwrap());
        assert!(!store.exists("c-2").await.unwrap());
        assert!(store.load("c-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_ids_is_sorted() {
        let store = InMemorySnapshotStore::<Counter>::new();
        store.save(&Counter::create("c-2", "x").unwrap()).await.unwrap();
        store.save(&Counter::create("c-1", "y").unwrap()).await.unwrap();

        assert_eq!(store.list_ids().await.unwrap(), vec!["c-1".to_string(), "c-2".to_string()]);
    }
}
