//! Settings commands.

use std::io::Write;

use anyhow::Result;
use nt_core::{Settings, UsageStore};

use crate::commands::util::minutes_to_secs;
use crate::display::render_settings;
use crate::driver::SessionDriver;

pub fn show<W: Write, S: UsageStore + 'static>(
    writer: &mut W,
    driver: &SessionDriver<S>,
) -> Result<()> {
    render_settings(writer, &driver.machine().settings())?;
    Ok(())
}

/// Saves the given changes on top of the current settings and prints the
/// settings in effect afterwards.
pub async fn set<W: Write, S: UsageStore + 'static>(
    writer: &mut W,
    driver: &mut SessionDriver<S>,
    limit_minutes: Option<u32>,
    auto_start: Option<bool>,
) -> Result<()> {
    let current = driver.machine().settings();
    let settings = Settings {
        total_time_limit_secs: limit_minutes.map_or(current.total_time_limit_secs, minutes_to_secs),
        auto_start: auto_start.unwrap_or(current.auto_start),
    };
    if settings != current {
        driver.set_settings(settings).await;
    }
    render_settings(writer, &driver.machine().settings())?;
    Ok(())
}
