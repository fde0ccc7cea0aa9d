//! Log file setup
//!
//! Every event goes to one append-only file, without ANSI colors. The
//! operator-facing lines are written to the terminal by the console.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global subscriber writing to `path`
pub fn init(path: &Path, level: Level) -> Result<()> {
    let file = open_append(path)?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Truncate the log file in place
///
/// The subscriber keeps its append handle, so later events land at the
/// start of the emptied file.
pub fn clear(path: &Path) -> std::io::Result<()> {
    OpenOptions::new().write(true).truncate(true).open(path)?;
    Ok(())
}
