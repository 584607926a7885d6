//! Implementation of the `nt stats` command.

use std::io::Write;

use anyhow::{Context, Result};
use nt_core::UsageStore;

use crate::display::render_stats;

/// Prints today's aggregate usage as reported by the store.
pub async fn run<W: Write, S: UsageStore + ?Sized>(
    writer: &mut W,
    store: &S,
    json: bool,
) -> Result<()> {
    let stats = store.stats().await.context("failed to fetch stats")?;
    if json {
        serde_json::to_writer_pretty(&mut *writer, &stats).context("failed to serialize stats")?;
        writeln!(writer)?;
    } else {
        render_stats(writer, &stats)?;
    }
    Ok(())
}
