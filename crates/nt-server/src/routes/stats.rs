use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use nt_core::api::SuccessResponse;
use nt_core::{DailyStats, compute_daily_stats};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(stats))
        .route("/reset", post(reset))
}

/// Aggregate usage for today.
async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<DailyStats>, ApiError> {
    let today = state.today();
    let rows = state.with_db(move |db| Ok(db.daily_usages(today)?)).await?;
    Ok(Json(compute_daily_stats(&rows)))
}

/// Deletes today's usage rows. Sources and settings are kept.
async fn reset(State(state): State<Arc<AppState>>) -> Result<Json<SuccessResponse>, ApiError> {
    let today = state.today();
    let removed = state.with_db(move |db| Ok(db.clear_usage(today)?)).await?;
    info!(removed, "daily usage reset");
    Ok(Json(SuccessResponse::OK))
}
