//! Implementation of the `nt import` command.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use nt_core::UsageStore;
use nt_core::api::ExportDocument;

use crate::driver::SessionDriver;

/// Reads a backup written by `nt export`.
pub fn read_document(path: &Path) -> Result<ExportDocument> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{} is not an export document", path.display()))
}

/// Applies the document's settings and the allocation of every source that
/// still exists, then reloads the source list.
///
/// Sources are never created or deleted by an import.
pub async fn apply<W: Write, S: UsageStore + 'static>(
    writer: &mut W,
    driver: &mut SessionDriver<S>,
    document: ExportDocument,
) -> Result<()> {
    if let Some(settings) = document.settings {
        driver.set_settings(settings).await;
    }

    let mut applied = 0_usize;
    for source in document.sources {
        if driver.machine().source(&source.key).is_none() {
            writeln!(writer, "Skipping unknown source {}", source.key)?;
            continue;
        }
        driver.set_allocation(&source.key, source.allocated).await;
        applied += 1;
    }
    driver.refresh().await;

    writeln!(writer, "Imported allocations for {applied} sources.")?;
    Ok(())
}

pub async fn run<W: Write, S: UsageStore + 'static>(
    writer: &mut W,
    driver: &mut SessionDriver<S>,
    path: &Path,
) -> Result<()> {
    let document = read_document(path)?;
    apply(writer, driver, document).await
}
