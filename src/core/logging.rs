//! Tracing setup. Both commands log to stderr; the build additionally keeps
//! a plain-text log file in its workspace.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Error, Result};

/// Environment variable overriding the default `info` filter.
pub const LOG_ENV_VAR: &str = "MONFORGE_LOG";

const LOG_FILE_NAME: &str = "monforge_build.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Stderr-only logging, used by the installer.
pub fn init() -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| Error::internal_unexpected(format!("failed to set up logging: {}", e)))
}

/// Stderr plus a log file inside the given directory. The returned guard
/// must stay alive for the duration of the run or buffered lines are lost.
pub fn init_with_log_dir(directory: &str) -> Result<WorkerGuard> {
    let appender = tracing_appender::rolling::never(directory, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .map_err(|e| Error::internal_unexpected(format!("failed to set up logging: {}", e)))?;
    Ok(guard)
}
