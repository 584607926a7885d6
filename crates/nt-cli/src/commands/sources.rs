//! Source management commands.

use std::io::Write;

use anyhow::{Context, Result};
use nt_core::UsageStore;
use nt_core::api::NewSourceRequest;

use crate::commands::util::{minutes_to_secs, parse_key};
use crate::display::render_sources;
use crate::driver::SessionDriver;

/// Lists sources with today's usage, as a table or JSON.
pub fn list<W: Write, S: UsageStore + 'static>(
    writer: &mut W,
    driver: &SessionDriver<S>,
    json: bool,
) -> Result<()> {
    let machine = driver.machine();
    if json {
        serde_json::to_writer_pretty(&mut *writer, machine.sources())
            .context("failed to serialize sources")?;
        writeln!(writer)?;
    } else {
        render_sources(writer, machine.sources(), machine.current_source())?;
    }
    Ok(())
}

/// Adds a source; the daily limit is then redistributed over all sources.
pub async fn add<S: UsageStore + 'static>(
    driver: &mut SessionDriver<S>,
    name: String,
    icon: Option<String>,
    url: Option<String>,
) -> Result<()> {
    let request = NewSourceRequest {
        name,
        icon,
        url,
        allocation: None,
    };
    driver.add_source(request).await;
    Ok(())
}

pub async fn remove<S: UsageStore + 'static>(
    driver: &mut SessionDriver<S>,
    key: &str,
) -> Result<()> {
    let key = parse_key(key)?;
    driver.remove_source(&key).await;
    Ok(())
}

pub async fn allocate<S: UsageStore + 'static>(
    driver: &mut SessionDriver<S>,
    key: &str,
    minutes: u32,
) -> Result<()> {
    let key = parse_key(key)?;
    driver.set_allocation(&key, minutes_to_secs(minutes)).await;
    Ok(())
}
