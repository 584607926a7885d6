use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::get;
use nt_core::api::SuccessResponse;
use nt_core::{Settings, validate_time_limit};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/settings", get(get_settings).put(put_settings))
}

/// Persisted settings, or the defaults when none were ever saved.
async fn get_settings(State(state): State<Arc<AppState>>) -> Result<Json<Settings>, ApiError> {
    let settings = state
        .with_db(|db| Ok(db.settings()?.unwrap_or_default()))
        .await?;
    Ok(Json(settings))
}

async fn put_settings(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Settings>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(settings) = payload?;
    validate_time_limit(settings.total_time_limit_secs)?;
    state
        .with_db(move |db| Ok(db.save_settings(&settings)?))
        .await?;
    info!(
        total_time_limit = settings.total_time_limit_secs,
        auto_start = settings.auto_start,
        "settings updated"
    );
    Ok(Json(SuccessResponse::OK))
}
