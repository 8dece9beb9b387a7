// ============================================================================
// Administrative HTTP Surface
// ============================================================================
//
//   POST /admin/replay/all
//   POST /admin/replay/aggregate/{id}
//   POST /admin/replay/after                  { "timestamp": RFC3339 }
//   GET  /admin/replay/info
//   POST /admin/rehydrate/{aggregate_type}/{id}
//   POST /admin/rehydrate/all[?aggregateType=TASK]
//   GET  /admin/sync/verify
//   GET  /metrics, /health
//
// Aggregate types match case-insensitively (USER, Family, task).
// Batch endpoints answer 200 even when items failed; `success` is false
// whenever the result carries errors or the stores disagree.
//
// ============================================================================

use std::sync::Arc;

use actix_web::{web, App, HttpServer};

use crate::event_sourcing::rehydration::{DynRehydrator, RehydrationEngine, SyncVerifier};
use crate::event_sourcing::replay::EventReplayer;
use crate::metrics::{health_handler, metrics_handler, Metrics};

pub mod handlers;

pub use handlers::{AdminError, RehydrateAllQuery, ReplayAfterRequest};

pub struct AdminState {
    pub replayer: EventReplayer,
    pub engine: RehydrationEngine,
    pub sync: SyncVerifier,
    pub rehydrators: Vec<Arc<dyn DynRehydrator>>,
}

impl AdminState {
    pub fn new(
        replayer: EventReplayer,
        engine: RehydrationEngine,
        sync: SyncVerifier,
        rehydrators: Vec<Arc<dyn DynRehydrator>>,
    ) -> Self {
        Self {
            replayer,
            engine,
            sync,
            rehydrators,
        }
    }

    pub fn rehydrator_for(&self, aggregate_type: &str) -> Option<&Arc<dyn DynRehydrator>> {
        self.rehydrators
            .iter()
            .find(|rehydrator| rehydrator.handled_type().eq_ignore_ascii_case(aggregate_type))
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/replay/all", web::post().to(handlers::replay_all))
            .route("/replay/aggregate/{id}", web::post().to(handlers::replay_aggregate))
            .route("/replay/after", web::post().to(handlers::replay_after))
            .route("/replay/info", web::get().to(handlers::replay_info))
            .route("/sync/verify", web::get().to(handlers::verify_sync))
            .route("/rehydrate/all", web::post().to(handlers::rehydrate_all))
            .route(
                "/rehydrate/{aggregate_type}/{id}",
                web::post().to(handlers::rehydrate_one),
            ),
    )
    .route("/metrics", web::get().to(metrics_handler))
    .route("/health", web::get().to(health_handler));
}

/// Run the admin server until shutdown.
pub async fn serve(state: AdminState, metrics: Arc<Metrics>, host: &str, port: u16) -> std::io::Result<()> {
    tracing::info!("Starting admin server on http://{}:{}", host, port);

    let state = web::Data::new(state);
    let metrics = web::Data::new(metrics);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(metrics.clone())
            .configure(routes)
    })
    .bind((host, port))?
    .run()
    .await
}

// ============================================================================
// Unit Tests
// ============================================================================
