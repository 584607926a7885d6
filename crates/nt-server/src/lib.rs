//! REST server for the news reading time tracker.
//!
//! Serves the store over JSON under `/api`. Every request goes through
//! [`AppState::with_db`], which opens and seeds the store on first use and
//! bounds each operation with a timeout.

mod config;
mod error;
pub mod routes;
mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::middleware::map_response_with_state;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use config::{ServerConfig, dirs_data_path};
pub use error::ApiError;
pub use state::AppState;

/// Builds the application router.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config().cors_origins);
    Router::new()
        .nest("/api", routes::router())
        .layer(map_response_with_state(
            Arc::clone(&state),
            error::attach_debug,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}
