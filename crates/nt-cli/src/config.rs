//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the REST surface.
    pub server_url: String,
    /// Upper bound on a single request; a timed-out request counts as offline.
    pub request_timeout_secs: u64,
    /// Snapshot file used while the server is unreachable.
    pub cache_path: PathBuf,
    /// Seconds between background source refreshes in `nt run`. 0 disables.
    pub refresh_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let state_dir = dirs_state_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            server_url: "http://127.0.0.1:3000/api".to_string(),
            request_timeout_secs: 10,
            cache_path: state_dir.join("cache.json"),
            refresh_interval_secs: 60,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (NT_*)
        figment = figment.merge(Env::prefixed("NT_"));

        figment.extract()
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn refresh_interval(&self) -> Option<Duration> {
        if self.refresh_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.refresh_interval_secs))
        }
    }
}

/// Returns the platform-specific config directory for nt.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("nt"))
}

/// Returns the platform-specific state directory for nt.
///
/// On Linux: `~/.local/state/nt`
pub fn dirs_state_path() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|p| p.join("nt"))
}
