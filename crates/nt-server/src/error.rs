//! Error taxonomy of the REST surface and its HTTP mapping.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use nt_core::ValidationError;
use nt_core::api::{ErrorBody, ErrorDebug};
use nt_db::DbError;
use thiserror::Error;
use tracing::error;

use crate::state::AppState;

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A field was missing, malformed, or out of range.
    #[error("{0}")]
    Validation(String),

    /// The referenced source does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A source with the same key already exists.
    #[error("{0}")]
    Conflict(String),

    /// The store could not be opened or did not answer in time.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Anything unexpected.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The message shown to clients. Lower-level detail of store failures is
    /// withheld.
    fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::NotFound(msg) | Self::Conflict(msg) => msg.clone(),
            Self::Unavailable(_) => "Service temporarily unavailable".to_string(),
            Self::Internal(_) => "Internal Server Error".to_string(),
        }
    }

    fn body(&self, with_debug: bool) -> ErrorBody {
        ErrorBody {
            error: self.public_message(),
            code: self.code().to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            debug: with_debug.then(|| ErrorDebug {
                original_message: self.to_string(),
            }),
        }
    }
}

/// The error body with diagnostics, carried on the response so that
/// [`attach_debug`] can swap it in when running in development mode.
#[derive(Debug, Clone)]
struct DebugBody(ErrorBody);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let debug_body = DebugBody(self.body(true));
        let mut response = (status, Json(self.body(false))).into_response();
        response.extensions_mut().insert(debug_body);
        response
    }
}

/// Response middleware that exposes error diagnostics in development mode.
pub async fn attach_debug(State(state): State<Arc<AppState>>, mut response: Response) -> Response {
    let Some(DebugBody(body)) = response.extensions_mut().remove::<DebugBody>() else {
        return response;
    };
    if state.config().development {
        (response.status(), Json(body)).into_response()
    } else {
        response
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::DuplicateKey(_) => Self::Conflict("Source already exists".to_string()),
            err if err.is_unavailable() => Self::Unavailable(err.to_string()),
            err => Self::Internal(err.to_string()),
        }
    }
}
