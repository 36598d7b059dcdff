//! Tracing subscriber setup.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level_override`, which wins over the configured
/// level. When a log file is configured, output goes there through a
/// non-blocking writer; keep the returned guard alive until exit so buffered
/// lines are flushed.
pub fn init(logging: &LoggingConfig, level_override: Option<&str>) -> Result<Option<WorkerGuard>> {
  let filter = build_filter(level_override.unwrap_or(logging.level.as_str()))?;

  match &logging.file {
    Some(path) => {
      let (directory, file_name) = split_log_path(path)?;
      let appender = tracing_appender::rolling::never(directory, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);

      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;
      Ok(None)
    }
  }
}

fn build_filter(level: &str) -> Result<EnvFilter> {
  EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(level))
    .map_err(|e| eyre!("Invalid log level '{}': {}", level, e))
}

fn split_log_path(path: &Path) -> Result<(&Path, &Path)> {
  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Log file path has no file name: {}", path.display()))?;
  let directory = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  Ok((directory, Path::new(file_name)))
}
