//! Logging setup: stderr always, plus an optional log file.
//!
//! stdout is reserved for tool payloads, so nothing is logged there.

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LogConfig;

/// Filter from RUST_LOG, else the configured level, else "info".
fn env_filter(config: &LogConfig) -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| {
    EnvFilter::try_new(config.level.as_deref().unwrap_or("info"))
      .unwrap_or_else(|_| EnvFilter::new("info"))
  })
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// whole program.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
  let stderr_layer = tracing_subscriber::fmt::layer()
    .with_writer(std::io::stderr)
    .with_target(false)
    .compact()
    .with_filter(env_filter(config));

  let Some(path) = &config.file else {
    tracing_subscriber::registry().with(stderr_layer).init();
    return Ok(None);
  };

  let directory = path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or_else(|| std::path::Path::new("."));
  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Log file path has no file name: {}", path.display()))?;

  std::fs::create_dir_all(directory)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", directory.display(), e))?;

  let file_appender = tracing_appender::rolling::never(directory, file_name);
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::registry()
    .with(stderr_layer)
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(env_filter(config)),
    )
    .init();

  Ok(Some(guard))
}
