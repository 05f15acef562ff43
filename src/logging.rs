//! File logging. The terminal belongs to the UI, so nothing goes to stdout.

use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directives, e.g. `PRODCAT_LOG=prodcat::client=debug`
pub const LOG_ENV: &str = "PRODCAT_LOG";

const LOG_FILE_PREFIX: &str = "prodcat.log";

/// `$XDG_DATA_HOME/prodcat/logs`, or `./logs` without a data directory
pub fn default_log_dir() -> PathBuf {
  dirs::data_dir()
    .map(|dir| dir.join("prodcat"))
    .unwrap_or_else(|| PathBuf::from("."))
    .join("logs")
}

/// Install the global subscriber writing to a daily file in `dir`.
///
/// Keep the returned guard alive until exit; dropping it flushes what is
/// still buffered.
pub fn init(dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let env_filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .with_env_var(LOG_ENV)
    .from_env_lossy();

  let fmt_layer = fmt::layer()
    .with_writer(writer)
    .with_ansi(false)
    .with_target(true);

  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}
