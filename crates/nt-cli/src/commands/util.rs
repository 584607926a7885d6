//! Shared utilities for CLI commands.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use nt_client::{ApiClient, LocalCache};
use nt_core::{SourceKey, UsageStore};

use crate::Config;
use crate::driver::SessionDriver;

/// Builds the HTTP client from configuration.
pub fn connect(config: &Config) -> Result<ApiClient> {
    ApiClient::new(&config.server_url, config.request_timeout())
        .with_context(|| format!("invalid server_url {}", config.server_url))
}

/// Loads a session against the configured server, falling back to the cache.
pub async fn open_session(config: &Config) -> Result<SessionDriver<ApiClient>> {
    let client = connect(config)?;
    let cache = LocalCache::new(&config.cache_path);
    Ok(SessionDriver::load(Arc::new(client), cache).await)
}

/// Parses a source key typed by the user.
pub fn parse_key(raw: &str) -> Result<SourceKey> {
    SourceKey::new(raw.trim()).context("source key cannot be empty")
}

/// Prints and clears the driver's pending notices.
pub fn print_notices<W: Write, S: UsageStore + 'static>(
    writer: &mut W,
    driver: &mut SessionDriver<S>,
) -> Result<()> {
    for notice in driver.take_notices() {
        writeln!(writer, "{notice}")?;
    }
    Ok(())
}

/// Minutes typed by the user as an allocation in seconds.
pub fn minutes_to_secs(minutes: u32) -> i64 {
    i64::from(minutes) * 60
}
