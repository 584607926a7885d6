//! Server configuration loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
    /// Path to the `SQLite` database file.
    pub database_path: PathBuf,
    /// Insert the default sources and settings into an empty store.
    pub seed_defaults: bool,
    /// Upper bound on a single store operation before the request fails with 503.
    pub store_timeout_secs: u64,
    /// Include diagnostic messages in error responses.
    pub development: bool,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            bind: "127.0.0.1:3000".to_string(),
            database_path: data_dir.join("nt.db"),
            seed_defaults: true,
            store_timeout_secs: 10,
            development: false,
            log_level: "info".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("server.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // NT_SERVER_*
        figment = figment.merge(Env::prefixed("NT_SERVER_"));

        figment.extract()
    }

    pub const fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("nt"))
}

/// Returns the platform-specific data directory for nt.
///
/// On Linux: `~/.local/share/nt`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("nt"))
}
