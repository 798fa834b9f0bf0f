//! Logging setup. The TUI owns the terminal, so log output goes to a file.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initialize file logging.
///
/// The filter comes from `RUST_LOG`, falling back to `default_level`. Keep
/// the returned guard alive for the program lifetime: dropping it flushes and
/// stops the background writer.
pub fn init_file_logging(path: &Path, default_level: &str) -> Result<WorkerGuard> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .with_context(|| format!("Log path has no file name: {}", path.display()))?;

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(filter),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}
