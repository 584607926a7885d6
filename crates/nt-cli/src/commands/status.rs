//! Status command for showing today's budget and per-source progress.

use std::io::Write;

use anyhow::Result;
use nt_core::UsageStore;

use crate::display::render_status;
use crate::driver::SessionDriver;

pub fn run<W: Write, S: UsageStore + 'static>(
    writer: &mut W,
    driver: &SessionDriver<S>,
) -> Result<()> {
    render_status(writer, driver.machine(), driver.mode())?;
    Ok(())
}
