//! HTTP routes, mounted under `/api`.

use std::sync::Arc;

use axum::Router;

use crate::error::ApiError;
use crate::state::AppState;

pub mod health;
pub mod settings;
pub mod sources;
pub mod stats;
pub mod usage;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(sources::router())
        .merge(settings::router())
        .merge(usage::router())
        .merge(stats::router())
        .merge(health::router())
        .fallback(not_found)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}
