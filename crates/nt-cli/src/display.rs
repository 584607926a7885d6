//! Terminal rendering of sessions, sources, settings and stats.

use std::io::{self, Write};

use nt_core::{
    DailyStats, Settings, SourceKey, SourceStatus, SyncMode, TimerStateMachine, TrackedSource,
};

/// Formats seconds as `MM:SS`; minutes are not wrapped into hours.
pub fn format_mmss(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Status column of a source row.
fn status_label(source: &TrackedSource) -> String {
    match source.timer.status() {
        SourceStatus::Overrun => format!("overrun (+{})", format_mmss(source.timer.overrun)),
        status => status.to_string(),
    }
}

/// One row per source; the current source is marked with `>`.
pub fn render_sources<W: Write>(
    writer: &mut W,
    sources: &[TrackedSource],
    current: Option<&SourceKey>,
) -> io::Result<()> {
    if sources.is_empty() {
        writeln!(writer, "No sources.")?;
        return Ok(());
    }
    for source in sources {
        let marker = if current == Some(&source.key) { '>' } else { ' ' };
        writeln!(
            writer,
            "{marker} {icon} {name:<20} {key:<20} {used} / {allocated}  {status}",
            icon = source.icon,
            name = source.name,
            key = source.key.as_str(),
            used = format_mmss(source.timer.used),
            allocated = format_mmss(source.timer.allocated),
            status = status_label(source),
        )?;
    }
    Ok(())
}

/// Daily totals, timer state and the source table.
pub fn render_status<W: Write>(
    writer: &mut W,
    machine: &TimerStateMachine,
    mode: SyncMode,
) -> io::Result<()> {
    let settings = machine.settings();
    writeln!(
        writer,
        "Remaining: {} of {} (used {})",
        format_mmss(machine.daily_remaining()),
        format_mmss(settings.total_time_limit_secs),
        format_mmss(machine.daily_used()),
    )?;
    match machine.current_source().and_then(|key| machine.source(key)) {
        Some(source) => writeln!(writer, "State: {} ({})", machine.state(), source.name)?,
        None => writeln!(writer, "State: {}", machine.state())?,
    }
    writeln!(writer, "Mode: {mode}")?;
    writeln!(writer, "Sources:")?;
    render_sources(writer, machine.sources(), machine.current_source())
}

pub fn render_settings<W: Write>(writer: &mut W, settings: &Settings) -> io::Result<()> {
    writeln!(
        writer,
        "Daily limit: {} minutes",
        settings.total_time_limit_secs / 60
    )?;
    writeln!(
        writer,
        "Auto start: {}",
        if settings.auto_start { "on" } else { "off" }
    )
}

pub fn render_stats<W: Write>(writer: &mut W, stats: &DailyStats) -> io::Result<()> {
    writeln!(writer, "Time used: {}", format_mmss(stats.total_time_used))?;
    writeln!(writer, "Sessions: {}", stats.total_sessions)?;
    writeln!(writer, "Overrun: {}", format_mmss(stats.total_overrun))?;
    writeln!(writer, "Sources used: {}", stats.sources_used)?;
    writeln!(
        writer,
        "Average session: {}",
        format_mmss(stats.average_session_time)
    )
}
