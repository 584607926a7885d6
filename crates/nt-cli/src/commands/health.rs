//! Implementation of the `nt health` command.

use std::io::Write;

use anyhow::{Context, Result};
use nt_client::ApiClient;

pub async fn run<W: Write>(writer: &mut W, client: &ApiClient) -> Result<()> {
    let health = client
        .health()
        .await
        .with_context(|| format!("server at {} is not reachable", client.base_url()))?;
    writeln!(
        writer,
        "Server {} (version {}) at {}",
        health.status, health.version, health.timestamp
    )?;
    Ok(())
}
