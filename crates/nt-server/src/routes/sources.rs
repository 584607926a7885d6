use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, put};
use nt_core::api::{AllocationRequest, NewSourceRequest, SourceView, SuccessResponse};
use nt_core::{
    DEFAULT_ALLOCATION_SECS, DEFAULT_ICON, Source, SourceKey, ValidationError, validate_allocation,
};
use tracing::info;
use url::Url;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sources", get(list_sources).post(add_source))
        .route("/sources/{key}", delete(delete_source))
        .route("/sources/{key}/allocation", put(set_allocation))
}

/// Active sources with today's usage.
async fn list_sources(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SourceView>>, ApiError> {
    let today = state.today();
    let views = state
        .with_db(move |db| Ok(db.sources_with_usage(today)?))
        .await?;
    Ok(Json(views))
}

async fn add_source(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewSourceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SourceView>), ApiError> {
    let Json(request) = payload?;
    let source = source_from_request(request)?;
    let view = source.to_view(None);

    state
        .with_db(move |db| Ok(db.insert_source(&source)?))
        .await?;
    info!(key = %view.key, allocated = view.allocated, "source added");
    Ok((StatusCode::CREATED, Json(view)))
}

async fn set_allocation(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    payload: Result<Json<AllocationRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(AllocationRequest { allocation }) = payload?;
    validate_allocation(allocation)?;
    let key = SourceKey::new(key)?;

    let log_key = key.clone();
    let updated = state
        .with_db(move |db| Ok(db.update_allocation(&key, allocation)?))
        .await?;
    if !updated {
        return Err(ApiError::NotFound("Source not found".to_string()));
    }
    info!(key = %log_key, allocation, "allocation updated");
    Ok(Json(SuccessResponse::OK))
}

/// Deletes a source together with all of its usage rows.
async fn delete_source(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let key = SourceKey::new(key)?;
    let log_key = key.clone();
    let deleted = state
        .with_db(move |db| Ok(db.delete_source(&key)?))
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("Source not found".to_string()));
    }
    info!(key = %log_key, "source deleted");
    Ok(Json(SuccessResponse::OK))
}

/// Validates a creation request and fills in defaults.
fn source_from_request(request: NewSourceRequest) -> Result<Source, ValidationError> {
    let key = SourceKey::from_name(&request.name)?;

    let allocated_secs = request.allocation.unwrap_or(DEFAULT_ALLOCATION_SECS);
    validate_allocation(allocated_secs)?;

    let url = match request.url.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(Url::parse(raw).map_err(|_| ValidationError::InvalidUrl {
            value: raw.to_string(),
        })?),
    };
    let favicon_url = url.as_ref().and_then(favicon_for);

    let icon = request
        .icon
        .map(|icon| icon.trim().to_string())
        .filter(|icon| !icon.is_empty())
        .unwrap_or_else(|| DEFAULT_ICON.to_string());

    Ok(Source {
        key,
        name: request.name.trim().to_string(),
        icon,
        url: url.map(String::from),
        favicon_url,
        allocated_secs,
        active: true,
    })
}

/// Favicon service URL for the site's host.
fn favicon_for(url: &Url) -> Option<String> {
    url.host_str()
        .map(|host| format!("https://www.google.com/s2/favicons?domain={host}&sz=32"))
}
