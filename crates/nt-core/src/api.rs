//! Request and response bodies of the REST surface.
//!
//! Every endpoint has its own explicit type; the server deserializes requests
//! into these and the client serializes them, so both sides agree on the
//! camelCase field names.

use serde::{Deserialize, Serialize};

use crate::allocation::DailyStats;
use crate::source::Settings;
use crate::types::SourceKey;

/// A source together with today's usage, as returned by `GET /sources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceView {
    pub key: SourceKey,
    pub name: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    /// Allocation in seconds.
    pub allocated: i64,
    /// Seconds used today.
    #[serde(default)]
    pub used: i64,
    #[serde(default)]
    pub sessions: i64,
    /// Seconds used beyond the allocation today.
    #[serde(default)]
    pub overrun_time: i64,
}

/// Body of `POST /sources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSourceRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Allocation in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation: Option<i64>,
}

impl NewSourceRequest {
    /// A request carrying only a name; every other field takes its default.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
            url: None,
            allocation: None,
        }
    }
}

/// Body of `PUT /sources/:key/allocation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRequest {
    /// Allocation in seconds.
    pub allocation: i64,
}

/// Body of `POST /usage`.
///
/// Counters are absolute values for today; the store overwrites rather than
/// adds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRequest {
    pub source_key: SourceKey,
    pub time_used: i64,
    pub sessions: i64,
    #[serde(default)]
    pub overrun_time: i64,
}

/// Body returned by mutating endpoints that have nothing else to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub const OK: Self = Self { success: true };
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

/// Error body produced by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<ErrorDebug>,
}

/// Diagnostic detail attached to [`ErrorBody`] in development mode only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDebug {
    pub original_message: String,
}

/// Backup document written by export and read by import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    #[serde(default)]
    pub sources: Vec<SourceView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<DailyStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_view_uses_camel_case_and_omits_missing_urls() {
        let view = SourceView {
            key: SourceKey::new("bbc").unwrap(),
            name: "BBC".to_string(),
            icon: "📰".to_string(),
            url: None,
            favicon_url: Some("https://bbc.co.uk/favicon.ico".to_string()),
            allocated: 300,
            used: 12,
            sessions: 0,
            overrun_time: 0,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["overrunTime"], 0);
        assert_eq!(json["faviconUrl"], "https://bbc.co.uk/favicon.ico");
        assert!(json.get("url").is_none());
    }

    #[test]
    fn usage_request_defaults_overrun_to_zero() {
        let parsed: UsageRequest =
            serde_json::from_str(r#"{"sourceKey":"cnn","timeUsed":40,"sessions":1}"#).unwrap();
        assert_eq!(parsed.overrun_time, 0);
        assert_eq!(parsed.source_key.as_str(), "cnn");
    }

    #[test]
    fn export_document_tolerates_partial_files() {
        let parsed: ExportDocument =
            serde_json::from_str(r#"{"settings":{"totalTimeLimit":600,"autoStart":true}}"#)
                .unwrap();
        assert!(parsed.sources.is_empty());
        assert_eq!(parsed.settings.unwrap().total_time_limit_secs, 600);
    }
}
