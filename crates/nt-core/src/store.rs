//! The store port: everything the session needs from the system of record.
//!
//! The HTTP client implements this against the REST surface; tests implement
//! it in memory.

use async_trait::async_trait;
use thiserror::Error;

use crate::allocation::DailyStats;
use crate::api::{NewSourceRequest, SourceView, UsageRequest};
use crate::source::Settings;
use crate::types::{SourceKey, ValidationError};

/// Errors reported by a [`UsageStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A field was missing or out of range.
    #[error("{0}")]
    Validation(String),

    /// The referenced source does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A source with the same key already exists.
    #[error("{0}")]
    Conflict(String),

    /// The store could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether the failure says nothing about the request itself and the
    /// offline fallback applies.
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Internal(_))
    }
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UsageStore: Send + Sync {
    /// All active sources with today's usage, in creation order.
    async fn list_sources(&self) -> StoreResult<Vec<SourceView>>;

    /// Creates a source and returns it with defaults filled in.
    async fn add_source(&self, request: &NewSourceRequest) -> StoreResult<SourceView>;

    /// Deletes a source and all of its usage rows.
    async fn delete_source(&self, key: &SourceKey) -> StoreResult<()>;

    async fn set_allocation(&self, key: &SourceKey, allocated_secs: i64) -> StoreResult<()>;

    /// Persisted settings, or the defaults if none were ever saved.
    async fn get_settings(&self) -> StoreResult<Settings>;

    async fn set_settings(&self, settings: &Settings) -> StoreResult<()>;

    /// Overwrites today's counters for one source.
    async fn record_usage(&self, usage: &UsageRequest) -> StoreResult<()>;

    async fn stats(&self) -> StoreResult<DailyStats>;

    /// Deletes today's usage rows; sources and settings are untouched.
    async fn clear_today(&self) -> StoreResult<()>;
}
