//! Implementation of the `nt reset` command.

use std::io::Write;

use anyhow::Result;
use nt_core::UsageStore;

use crate::display::format_mmss;
use crate::driver::SessionDriver;

/// Clears today's usage, locally and in the store.
pub async fn run<W: Write, S: UsageStore + 'static>(
    writer: &mut W,
    driver: &mut SessionDriver<S>,
) -> Result<()> {
    driver.reset().await;
    writeln!(
        writer,
        "Remaining today: {}",
        format_mmss(driver.machine().daily_remaining())
    )?;
    Ok(())
}
