//! News sources, their daily usage rows, and the settings singleton.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::SourceView;
use crate::types::{DEFAULT_TIME_LIMIT_SECS, SourceKey};

/// A named news feed with its own daily time budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Derived from the name at creation; never changes afterwards.
    pub key: SourceKey,
    pub name: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    /// Daily allocation in seconds.
    pub allocated_secs: i64,
    pub active: bool,
}

impl Source {
    /// Combines the source with (optional) usage for a day into its wire view.
    pub fn to_view(&self, usage: Option<&DailyUsage>) -> SourceView {
        SourceView {
            key: self.key.clone(),
            name: self.name.clone(),
            icon: self.icon.clone(),
            url: self.url.clone(),
            favicon_url: self.favicon_url.clone(),
            allocated: self.allocated_secs,
            used: usage.map_or(0, |u| u.used_secs),
            sessions: usage.map_or(0, |u| u.sessions),
            overrun_time: usage.map_or(0, |u| u.overrun_secs),
        }
    }
}

/// Usage counters for one source on one day.
///
/// There is at most one row per `(source_key, date)`; writes overwrite the
/// counters rather than adding to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub source_key: SourceKey,
    pub date: NaiveDate,
    pub used_secs: i64,
    pub sessions: i64,
    pub overrun_secs: i64,
}

/// Seconds used beyond an allocation, never negative.
pub const fn overrun(used_secs: i64, allocated_secs: i64) -> i64 {
    let over = used_secs - allocated_secs;
    if over > 0 { over } else { 0 }
}

/// User settings. Exactly one logical row exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Aggregate daily ceiling across all sources, in seconds.
    #[serde(rename = "totalTimeLimit")]
    pub total_time_limit_secs: i64,
    #[serde(rename = "autoStart")]
    pub auto_start: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            total_time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            auto_start: false,
        }
    }
}

/// One of the sources a fresh store is seeded with.
#[derive(Debug, Clone, Copy)]
pub struct DefaultSource {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
}

/// Sources created on first initialization of an empty store, 300 s each.
pub const DEFAULT_SOURCES: [DefaultSource; 6] = [
    DefaultSource {
        key: "bbc-football",
        name: "BBC Football",
        icon: "⚽",
    },
    DefaultSource {
        key: "bbc-headlines",
        name: "BBC Headlines",
        icon: "📰",
    },
    DefaultSource {
        key: "rte-headlines",
        name: "RTE Headlines",
        icon: "📺",
    },
    DefaultSource {
        key: "guardian-headlines",
        name: "Guardian Headlines",
        icon: "📰",
    },
    DefaultSource {
        key: "guardian-opinion",
        name: "Guardian Opinion",
        icon: "💭",
    },
    DefaultSource {
        key: "cnn",
        name: "CNN",
        icon: "🌍",
    },
];
