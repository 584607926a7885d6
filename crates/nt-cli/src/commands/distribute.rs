//! Implementation of the `nt distribute` command.

use std::io::Write;

use anyhow::Result;
use nt_core::UsageStore;

use crate::display::render_sources;
use crate::driver::SessionDriver;

/// Splits the daily limit (or `minutes`, saved as the new limit) evenly
/// across all sources and prints the resulting allocations.
pub async fn run<W: Write, S: UsageStore + 'static>(
    writer: &mut W,
    driver: &mut SessionDriver<S>,
    minutes: Option<u32>,
) -> Result<()> {
    driver.distribute(minutes).await;
    let machine = driver.machine();
    render_sources(writer, machine.sources(), machine.current_source())?;
    Ok(())
}
