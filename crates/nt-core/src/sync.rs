//! Online/offline synchronization policy and the local cache snapshot.
//!
//! The store is the system of record. When a remote call fails the client
//! keeps working from a local cache that holds a full snapshot of the session,
//! overwritten wholesale on every save. The next successful remote read
//! brings the client back online.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::timer::SessionSnapshot;

/// Whether the last remote call succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Online,
    Offline,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// What the caller must do after a mutating remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The store accepted the write.
    Remote,
    /// The store was unreachable; the caller must save the local cache.
    CacheFallback,
}

/// Tracks the sync mode from the outcome of remote calls.
#[derive(Debug, Clone, Default)]
pub struct SyncPolicy {
    mode: SyncMode,
}

impl SyncPolicy {
    pub const fn new(mode: SyncMode) -> Self {
        Self { mode }
    }

    pub const fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn is_offline(&self) -> bool {
        self.mode == SyncMode::Offline
    }

    /// Records the result of a remote write.
    ///
    /// A failed write flips to offline. A successful write does not flip back
    /// online; only a successful read does.
    pub fn after_write<T, E: std::fmt::Display>(&mut self, result: &Result<T, E>) -> WriteOutcome {
        match result {
            Ok(_) => WriteOutcome::Remote,
            Err(e) => {
                if self.mode == SyncMode::Online {
                    warn!(error = %e, "remote write failed, switching to offline mode");
                }
                self.mode = SyncMode::Offline;
                WriteOutcome::CacheFallback
            }
        }
    }

    /// Records the result of a remote read.
    pub fn after_read<T, E: std::fmt::Display>(&mut self, result: &Result<T, E>) {
        match (self.mode, result) {
            (SyncMode::Offline, Ok(_)) => {
                info!("remote read succeeded, back online");
                self.mode = SyncMode::Online;
            }
            (SyncMode::Online, Err(e)) => {
                warn!(error = %e, "remote read failed, switching to offline mode");
                self.mode = SyncMode::Offline;
            }
            _ => {}
        }
    }
}

/// Contents of the local cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    #[serde(flatten)]
    pub session: SessionSnapshot,
    pub saved_at: DateTime<Utc>,
}

impl CacheSnapshot {
    pub fn new(session: SessionSnapshot) -> Self {
        Self {
            session,
            saved_at: Utc::now(),
        }
    }

    /// Whether the snapshot was taken on the given UTC day.
    ///
    /// Usage counters are per day; a snapshot from an earlier day only
    /// contributes source definitions and settings.
    pub fn is_from(&self, day: chrono::NaiveDate) -> bool {
        self.saved_at.date_naive() == day
    }
}
