//! Implementation of the `nt export` command.
//!
//! Writes the current sources, settings and (when the server is reachable)
//! today's stats as a single JSON document that `nt import` can read back.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use nt_core::api::{ExportDocument, SourceView};
use nt_core::{SyncMode, TrackedSource, UsageStore};
use tracing::debug;

use crate::driver::SessionDriver;

/// Builds the backup document.
///
/// Sources come from the store while online so URLs survive the round trip;
/// offline, the session's own copy is used and stats are omitted.
pub async fn document<S: UsageStore + 'static>(driver: &SessionDriver<S>) -> ExportDocument {
    let store = driver.store();
    let online = driver.mode() == SyncMode::Online;

    let sources = if online {
        match store.list_sources().await {
            Ok(views) => Some(views),
            Err(err) => {
                debug!(error = %err, "falling back to session sources for export");
                None
            }
        }
    } else {
        None
    };
    let sources = sources.unwrap_or_else(|| {
        driver
            .machine()
            .sources()
            .iter()
            .map(tracked_view)
            .collect()
    });
    let stats = if online { store.stats().await.ok() } else { None };

    ExportDocument {
        sources,
        settings: Some(driver.machine().settings()),
        stats,
        export_date: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    }
}

pub async fn run<W: Write, S: UsageStore + 'static>(
    writer: &mut W,
    driver: &SessionDriver<S>,
) -> Result<()> {
    let document = document(driver).await;
    serde_json::to_writer_pretty(&mut *writer, &document)
        .context("failed to serialize export")?;
    writeln!(writer)?;
    Ok(())
}

fn tracked_view(source: &TrackedSource) -> SourceView {
    SourceView {
        key: source.key.clone(),
        name: source.name.clone(),
        icon: source.icon.clone(),
        url: None,
        favicon_url: None,
        allocated: source.timer.allocated,
        used: source.timer.used,
        sessions: source.timer.sessions,
        overrun_time: source.timer.overrun,
    }
}
