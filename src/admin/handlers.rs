use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use super::AdminState;
use crate::event_sourcing::rehydration::{DynRehydrator, RehydrationError, RehydrationOutcome};
use crate::event_sourcing::replay::ReplayProgress;

// ============================================================================
// Admin Errors → HTTP
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RehydrationError> for AdminError {
    fn from(err: RehydrationError) -> Self {
        match err {
            RehydrationError::UnsupportedAggregateType { .. } => AdminError::BadRequest(err.to_string()),
            RehydrationError::NoEvents { .. } | RehydrationError::AggregateTypeMismatch { .. } => {
                AdminError::NotFound(err.to_string())
            }
            other => AdminError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl ResponseError for AdminError {
    fn status_code(&self) -> StatusCode {
        match self {
            AdminError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AdminError::Internal(err) = self {
            tracing::error!(error = %err, "Admin operation failed");
        }
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.to_string(),
        }))
    }
}

// ============================================================================
// Replay
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReplayAfterRequest {
    pub timestamp: DateTime<Utc>,
}

fn replay_response(subject: &str, progress: ReplayProgress) -> HttpResponse {
    let message = if progress.is_complete() {
        format!("{subject}: {} events replayed", progress.processed_events)
    } else {
        format!(
            "{subject}: {} of {} events replayed, {} failed",
            progress.processed_events, progress.total_events, progress.failed_events
        )
    };

    HttpResponse::Ok().json(json!({
        "success": progress.is_complete(),
        "message": message,
        "progress": progress,
    }))
}

pub async fn replay_all(state: web::Data<AdminState>) -> Result<HttpResponse, AdminError> {
    let progress = state.replayer.replay_all().await?;
    Ok(replay_response("Replay of all events", progress))
}

pub async fn replay_aggregate(
    state: web::Data<AdminState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AdminError> {
    let aggregate_id = path.into_inner();
    let progress = state.replayer.replay_aggregate(&aggregate_id).await?;

    if progress.total_events == 0 {
        return Err(AdminError::NotFound(format!("no events found for aggregate {aggregate_id}")));
    }
    Ok(replay_response(&format!("Replay of aggregate {aggregate_id}"), progress))
}

pub async fn replay_after(
    state: web::Data<AdminState>,
    body: web::Json<ReplayAfterRequest>,
) -> Result<HttpResponse, AdminError> {
    let timestamp = body.into_inner().timestamp;
    let progress = state.replayer.replay_after(timestamp).await?;
    Ok(replay_response(&format!("Replay of events after {}", timestamp.to_rfc3339()), progress))
}

pub async fn replay_info() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Event replay API",
        "endpoints": {
            "full": "POST /admin/replay/all",
            "aggregate": "POST /admin/replay/aggregate/{id}",
            "after": "POST /admin/replay/after (body: { \"timestamp\": RFC3339 })",
        },
    }))
}

// ============================================================================
// Rehydration
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RehydrateAllQuery {
    #[serde(rename = "aggregateType")]
    pub aggregate_type: Option<String>,
}

fn rehydrator_for<'a>(state: &'a AdminState, requested: &str) -> Result<&'a Arc<dyn DynRehydrator>, AdminError> {
    state
        .rehydrator_for(requested)
        .ok_or_else(|| AdminError::BadRequest(format!("unsupported aggregate type: {requested}")))
}

pub async fn rehydrate_one(
    state: web::Data<AdminState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AdminError> {
    let (requested, aggregate_id) = path.into_inner();
    let rehydrator = rehydrator_for(&state, &requested)?;
    let aggregate_type = rehydrator.handled_type().to_string();

    let outcome = state
        .engine
        .rehydrate_one(&aggregate_id, &aggregate_type, rehydrator.as_ref())
        .await?;

    let message = match outcome {
        RehydrationOutcome::Rehydrated { version } => {
            format!("{aggregate_type} {aggregate_id} rehydrated at version {version}")
        }
        RehydrationOutcome::AlreadyPresent => {
            format!("{aggregate_type} {aggregate_id} already exists, skipped")
        }
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": message,
        "outcome": outcome,
    })))
}

pub async fn rehydrate_all(
    state: web::Data<AdminState>,
    query: web::Query<RehydrateAllQuery>,
) -> Result<HttpResponse, AdminError> {
    let results = match query.into_inner().aggregate_type {
        Some(requested) => {
            let rehydrator = rehydrator_for(&state, &requested)?;
            let result = state
                .engine
                .rehydrate_all_of_type(rehydrator.handled_type(), rehydrator.as_ref())
                .await?;
            vec![result]
        }
        None => state.engine.rehydrate_all_types(&state.rehydrators).await,
    };

    let success = results.iter().all(|result| result.is_complete());
    let rehydrated: usize = results.iter().map(|result| result.rehydrated).sum();
    let failed: usize = results.iter().map(|result| result.errors.len()).sum();

    Ok(HttpResponse::Ok().json(json!({
        "success": success,
        "message": format!("{rehydrated} aggregates rehydrated, {failed} failures"),
        "results": results,
    })))
}

// ============================================================================
// Sync Verification
// ============================================================================

pub async fn verify_sync(state: web::Data<AdminState>) -> Result<HttpResponse, AdminError> {
    let report = state.sync.verify(&state.rehydrators).await?;

    let message = if report.summary.is_sync {
        "snapshot store and event log are in sync".to_string()
    } else {
        format!("{} inconsistencies found", report.summary.total_inconsistencies)
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": report.summary.is_sync,
        "message": message,
        "report": report,
    })))
}
