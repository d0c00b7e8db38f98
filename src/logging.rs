use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::error::TradingError;

/// Stdout plus a daily-rolling `<dir>/<bot_id>.<date>.log` file.
///
/// `RUST_LOG` overrides the default `info` filter. Keep the returned guard
/// alive for the life of the process or buffered file lines are lost.
pub fn init_tracing(log_dir: impl AsRef<Path>, bot_id: &str) -> Result<WorkerGuard, TradingError> {
    let log_dir = log_dir.as_ref();
    std::fs::create_dir_all(log_dir).map_err(|e| {
        TradingError::Config(format!("Cannot create log dir {}: {}", log_dir.display(), e))
    })?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(bot_id)
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|e| TradingError::Config(format!("Cannot open log file: {}", e)))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stdout);

    // No ANSI escapes in the file
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| TradingError::Config(format!("Logging already initialised: {}", e)))?;

    Ok(guard)
}
