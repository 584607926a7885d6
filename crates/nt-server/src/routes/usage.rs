use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use nt_core::api::{SuccessResponse, UsageRequest};
use nt_core::{DailyUsage, validate_usage};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/usage", post(record_usage))
}

/// Overwrites today's counters for one source.
async fn record_usage(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UsageRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(request) = payload?;
    validate_usage(request.time_used, request.sessions, request.overrun_time)?;

    let usage = DailyUsage {
        source_key: request.source_key,
        date: state.today(),
        used_secs: request.time_used,
        sessions: request.sessions,
        overrun_secs: request.overrun_time,
    };
    let key = usage.source_key.clone();
    let written = state.with_db(move |db| Ok(db.upsert_usage(&usage)?)).await?;
    if !written {
        return Err(ApiError::NotFound("Source not found".to_string()));
    }
    debug!(source = %key, used = request.time_used, "usage recorded");
    Ok(Json(SuccessResponse::OK))
}
