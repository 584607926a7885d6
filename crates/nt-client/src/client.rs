//! HTTP client for the REST surface.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use nt_core::api::{
    AllocationRequest, ErrorBody, HealthResponse, NewSourceRequest, SourceView, SuccessResponse,
    UsageRequest,
};
use nt_core::{DailyStats, Settings, SourceKey, StoreError, StoreResult, UsageStore};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The base URL could not be used.
    #[error("invalid server URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// The request did not complete (connection refused, timeout, ...).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server answered with an error status.
    #[error("server error {status}: {message}")]
    Api {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },
    /// The response body was not what the endpoint returns.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ClientError> for StoreError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Request(e) => Self::Unavailable(e.to_string()),
            ClientError::Api {
                status,
                code,
                message,
            } => match status {
                StatusCode::NOT_FOUND => Self::NotFound(message),
                StatusCode::BAD_REQUEST if code.as_deref() == Some("CONFLICT") => {
                    Self::Conflict(message)
                }
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    Self::Validation(message)
                }
                StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::BAD_GATEWAY
                | StatusCode::GATEWAY_TIMEOUT => Self::Unavailable(message),
                _ => Self::Internal(format!("{status}: {message}")),
            },
            err @ (ClientError::InvalidUrl { .. }
            | ClientError::ClientBuild(_)
            | ClientError::InvalidResponse(_)) => Self::Internal(err.to_string()),
        }
    }
}

/// Client for the `/api` REST surface.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client for the API rooted at `base_url`
    /// (e.g. `http://127.0.0.1:3000/api`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: base_url.to_string(),
                reason: "not a base URL".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::ClientBuild)?;

        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.request(Method::GET, &["health"], None::<&()>).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl {
                url: self.base.to_string(),
                reason: "not a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request<T, B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "api request");
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status, &text));
        }
        serde_json::from_str(&text).map_err(|err| ClientError::InvalidResponse(err.to_string()))
    }

    async fn expect_success<B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        let response: SuccessResponse = self.request(method, segments, body).await?;
        if response.success {
            Ok(())
        } else {
            Err(ClientError::InvalidResponse(
                "server reported success: false".to_string(),
            ))
        }
    }
}

fn api_error(status: StatusCode, body: &str) -> ClientError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(error) => ClientError::Api {
            status,
            code: Some(error.code),
            message: error.error,
        },
        Err(_) => ClientError::Api {
            status,
            code: None,
            message: body.trim().to_string(),
        },
    }
}

#[async_trait]
impl UsageStore for ApiClient {
    async fn list_sources(&self) -> StoreResult<Vec<SourceView>> {
        Ok(self
            .request(Method::GET, &["sources"], None::<&()>)
            .await?)
    }

    async fn add_source(&self, request: &NewSourceRequest) -> StoreResult<SourceView> {
        Ok(self
            .request(Method::POST, &["sources"], Some(request))
            .await?)
    }

    async fn delete_source(&self, key: &SourceKey) -> StoreResult<()> {
        Ok(self
            .expect_success(Method::DELETE, &["sources", key.as_str()], None::<&()>)
            .await?)
    }

    async fn set_allocation(&self, key: &SourceKey, allocated_secs: i64) -> StoreResult<()> {
        let body = AllocationRequest {
            allocation: allocated_secs,
        };
        Ok(self
            .expect_success(
                Method::PUT,
                &["sources", key.as_str(), "allocation"],
                Some(&body),
            )
            .await?)
    }

    async fn get_settings(&self) -> StoreResult<Settings> {
        Ok(self
            .request(Method::GET, &["settings"], None::<&()>)
            .await?)
    }

    async fn set_settings(&self, settings: &Settings) -> StoreResult<()> {
        Ok(self
            .expect_success(Method::PUT, &["settings"], Some(settings))
            .await?)
    }

    async fn record_usage(&self, usage: &UsageRequest) -> StoreResult<()> {
        Ok(self
            .expect_success(Method::POST, &["usage"], Some(usage))
            .await?)
    }

    async fn stats(&self) -> StoreResult<DailyStats> {
        Ok(self.request(Method::GET, &["stats"], None::<&()>).await?)
    }

    async fn clear_today(&self) -> StoreResult<()> {
        Ok(self
            .expect_success(Method::POST, &["reset"], None::<&()>)
            .await?)
    }
}
