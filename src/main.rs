use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use family_tasks_es::admin::{self, AdminState};
use family_tasks_es::config::{BusKind, Config, ScyllaConfig, StoreBackend};
use family_tasks_es::domain::{
    self,
    family::{FamilyAggregate, FamilyRehydrator},
    task::{TaskAggregate, TaskRehydrator},
    user::{UserAggregate, UserRehydrator},
};
use family_tasks_es::event_sourcing::{
    AggregateRepository, DynRehydrator, EventBus, EventReplayer, EventStore,
    InMemoryEventStore, InMemorySnapshotStore, ProjectionBus, RehydrationEngine, ScyllaEventStore,
    ScyllaSnapshotStore, SnapshotStore, SyncVerifier,
};
use family_tasks_es::messaging::RedpandaEventBus;
use family_tasks_es::metrics::Metrics;
use family_tasks_es::utils::{retry_with_backoff, RetryConfig};

/// Snapshot stores for every aggregate type.
struct SnapshotStores {
    users: Arc<dyn SnapshotStore<UserAggregate>>,
    families: Arc<dyn SnapshotStore<FamilyAggregate>>,
    tasks: Arc<dyn SnapshotStore<TaskAggregate>>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    // RUST_LOG wins over the configured filter
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_filter)),
        )
        .init();

    tracing::info!(
        store = ?config.store.backend,
        bus = ?config.bus.kind,
        "Starting family tasks admin"
    );

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    let decoder = domain::decoder().with_metrics(metrics.clone());

    // === 2. Event bus ===
    let bus: Arc<dyn EventBus> = match config.bus.kind {
        BusKind::Projections => {
            tracing::info!("Publishing to in-process projections");
            Arc::new(ProjectionBus::new())
        }
        BusKind::Redpanda => Arc::new(
            RedpandaEventBus::new(&config.redpanda.brokers, &config.redpanda.topic)?
                .with_metrics(metrics.clone()),
        ),
    };

    // === 3. Event store and snapshot stores ===
    let (store, snapshots): (Arc<dyn EventStore>, SnapshotStores) = match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory event store; nothing survives a restart");
            let store = InMemoryEventStore::new(decoder).with_metrics(metrics.clone());
            let snapshots = SnapshotStores {
                users: Arc::new(InMemorySnapshotStore::<UserAggregate>::new()),
                families: Arc::new(InMemorySnapshotStore::<FamilyAggregate>::new()),
                tasks: Arc::new(InMemorySnapshotStore::<TaskAggregate>::new()),
            };
            (Arc::new(store), snapshots)
        }
        StoreBackend::Scylla => {
            let session = connect_scylla(&config.scylla).await?;
            ScyllaEventStore::ensure_schema(&session, &config.scylla.keyspace).await?;
            ScyllaSnapshotStore::<TaskAggregate>::ensure_schema(&session).await?;

            let store = ScyllaEventStore::new(session.clone(), decoder).with_metrics(metrics.clone());
            let snapshots = SnapshotStores {
                users: Arc::new(ScyllaSnapshotStore::<UserAggregate>::new(session.clone())),
                families: Arc::new(ScyllaSnapshotStore::<FamilyAggregate>::new(session.clone())),
                tasks: Arc::new(ScyllaSnapshotStore::<TaskAggregate>::new(session)),
            };
            (Arc::new(store), snapshots)
        }
    };

    // === 4. Batch operations ===
    let rehydrators = rehydrators(&store, &bus, snapshots);
    let state = AdminState::new(
        EventReplayer::new(store.clone(), bus).with_metrics(metrics.clone()),
        RehydrationEngine::new(store.clone()).with_metrics(metrics.clone()),
        SyncVerifier::new(store),
        rehydrators,
    );

    // === 5. Admin server ===
    let (host, port) = config.bind_address();
    admin::serve(state, metrics, &host, port).await?;

    tracing::info!("Admin server stopped");
    Ok(())
}

async fn connect_scylla(config: &ScyllaConfig) -> anyhow::Result<Arc<Session>> {
    let retry = RetryConfig {
        max_attempts: config.connect_attempts.max(1),
        ..RetryConfig::aggressive()
    };

    let session = retry_with_backoff(retry, |attempt| {
        let known_node = config.known_node.clone();
        async move {
            tracing::info!(attempt = attempt, node = %known_node, "Connecting to ScyllaDB");
            SessionBuilder::new().known_node(known_node).build().await
        }
    })
    .await
    .into_result()?;

    Ok(Arc::new(session))
}

fn rehydrators(
    store: &Arc<dyn EventStore>,
    bus: &Arc<dyn EventBus>,
    snapshots: SnapshotStores,
) -> Vec<Arc<dyn DynRehydrator>> {
    vec![
        Arc::new(UserRehydrator::new(AggregateRepository::new(
            store.clone(),
            snapshots.users,
            bus.clone(),
        ))),
        Arc::new(FamilyRehydrator::new(AggregateRepository::new(
            store.clone(),
            snapshots.families,
            bus.clone(),
        ))),
        Arc::new(TaskRehydrator::new(AggregateRepository::new(
            store.clone(),
            snapshots.tasks,
            bus.clone(),
        ))),
    ]
}
