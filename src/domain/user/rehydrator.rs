use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::aggregate::UserAggregate;
use super::value_objects::temporary_credential;
use crate::event_sourcing::core::{Aggregate, Event};
use crate::event_sourcing::rehydration::Rehydrator;
use crate::event_sourcing::repository::AggregateRepository;

// ============================================================================
// User Rehydrator
// ============================================================================
//
// Password hashes are not in the event log. A surviving hash is reused when
// a `CredentialLookup` can find one; otherwise the user gets a placeholder
// credential and must reset their password.
//
// ============================================================================

/// Source of password hashes that outlived the snapshot store.
#[async_trait]
pub trait CredentialLookup: Send + Sync {
    async fn password_hash(&self, user_id: &str) -> anyhow::Result<Option<String>>;
}

pub struct UserRehydrator {
    repository: AggregateRepository<UserAggregate>,
    credentials: Option<Arc<dyn CredentialLookup>>,
}

impl UserRehydrator {
    pub fn new(repository: AggregateRepository<UserAggregate>) -> Self {
        Self {
            repository,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialLookup>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    async fn surviving_hash(&self, user_id: &str) -> anyhow::Result<Option<String>> {
        match &self.credentials {
            Some(lookup) => lookup.password_hash(user_id).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Rehydrator for UserRehydrator {
    type Aggregate = UserAggregate;

    fn aggregate_type(&self) -> &str {
        UserAggregate::aggregate_type()
    }

    async fn check_exists(&self, aggregate_id: &str) -> anyhow::Result<bool> {
        Ok(self.repository.exists(aggregate_id).await?)
    }

    async fn rehydrate_aggregate(&self, aggregate_id: &str, events: &[Event]) -> anyhow::Result<UserAggregate> {
        let mut user = UserAggregate::rebuild_from_events(aggregate_id, events)?;

        match self.surviving_hash(aggregate_id).await? {
            Some(hash) => user.restore_credentials(hash, false),
            None => {
                tracing::warn!(
                    aggregate_id = %aggregate_id,
                    "Password not available, temporary credential set; user must reset password"
                );
                let placeholder = temporary_credential(aggregate_id, Utc::now().timestamp_millis());
                user.restore_credentials(placeholder, true);
            }
        }

        Ok(user)
    }

    async fn save_without_events(&self, aggregate: &UserAggregate) -> anyhow::Result<()> {
        Ok(self.repository.persist_snapshot_only(aggregate).await?)
    }

    async fn list_snapshot_ids(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.repository.snapshot_ids().await?)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::{UserCommand, UserEvent, TEMPORARY_CREDENTIAL_PREFIX};
    use crate::event_sourcing::bus::ProjectionBus;
    use crate::event_sourcing::core::EventDecoder;
    use crate::event_sourcing::rehydration::{RehydrationEngine, RehydrationOutcome};
    use crate::event_sourcing::repository::{InMemorySnapshotStore, SnapshotStore};
    use crate::event_sourcing::store::InMemoryEventStore;

    struct FixedLookup(&'static str);

    #[async_trait]
    impl CredentialLookup for FixedLookup {
        async fn password_hash(&self, _user_id: &str) -> anyhow::Result<Option<String>> {
            Ok(Some(self.0.to_string()))
        }
    }

    async fn lost_user() -> (
        AggregateRepository<UserAggregate>,
        InMemoryEventStore,
        InMemorySnapshotStore<UserAggregate>,
    ) {
        let store = InMemoryEventStore::new(EventDecoder::for_domain::<UserEvent>());
        let snapshots = InMemorySnapshotStore::<UserAggregate>::new();
        let repository = AggregateRepository::new(
            Arc::new(store.clone()),
            Arc::new(snapshots.clone()),
            Arc::new(ProjectionBus::new()),
        );

        let mut user = UserAggregate::create("user-1234567890", "Ana Silva", "ana@example.com", "$hash").unwrap();
        user.execute(&UserCommand::RecordLogin).unwrap();
        repository.persist_snapshot_and_append_events(&mut user).await.unwrap();
        assert!(snapshots.remove("user-1234567890").await);

        (repository, store, snapshots)
    }

    #[tokio::test]
    async fn test_rehydrate_without_lookup_sets_temporary_credential() {
        let (repository, store, snapshots) = lost_user().await;
        let engine = RehydrationEngine::new(Arc::new(store));
        let rehydrator = UserRehydrator::new(repository);

        let outcome = engine
            .rehydrate_one("user-1234567890", "User", &rehydrator)
            .await
            .unwrap();

        assert_eq!(outcome, RehydrationOutcome::Rehydrated { version: 2 });
        let restored = snapshots.load("user-1234567890").await.unwrap().unwrap();
        assert!(restored.password_hash().starts_with("TEMP_RESET_user-123_"));
        assert!(restored.password_hash().starts_with(TEMPORARY_CREDENTIAL_PREFIX));
        assert!(restored.must_reset_password());
        assert_eq!(restored.login_count, 1);
    }

    #[tokio::test]
    async fn test_rehydrate_reuses_surviving_hash() {
        let (repository, store, snapshots) = lost_user().await;
        let engine = RehydrationEngine::new(Arc::new(store));
        let rehydrator = UserRehydrator::new(repository).with_credentials(Arc::new(FixedLookup("$kept")));

        engine
            .rehydrate_one("user-1234567890", "User", &rehydrator)
            .await
            .unwrap();

        let restored = snapshots.load("user-1234567890").await.unwrap().unwrap();
        assert_eq!(restored.password_hash(), "$kept");
        assert!(!restored.must_reset_password());
    }

    #[tokio::test]
    async fn test_rehydrate_skips_existing_user() {
        let (repository, store, snapshots) = lost_user().await;
        let user = UserAggregate::create("user-1234567890", "Ana Silva", "ana@example.com", "$live").unwrap();
        snapshots.save(&user).await.unwrap();

        let engine = RehydrationEngine::new(Arc::new(store));
        let outcome = engine
            .rehydrate_one("user-1234567890", "User", &UserRehydrator::new(repository))
            .await
            .unwrap();

        assert_eq!(outcome, RehydrationOutcome::AlreadyPresent);
        let kept = snapshots.load("user-1234567890").await.unwrap().unwrap();
        assert_eq!(kept.password_hash(), "$live");
    }
}
