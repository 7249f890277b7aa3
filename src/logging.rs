//! Logging setup: stdout plus an append-only `webhook.log` file.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE: &str = "webhook.log";

/// Keeps the file writer flushing; drop it only at process exit.
pub struct LogHandle {
    file_guard: Option<WorkerGuard>,
}

impl LogHandle {
    pub fn file_logging(&self) -> bool {
        self.file_guard.is_some()
    }
}

/// Install the global subscriber.
///
/// `level` seeds the filter unless `RUST_LOG` is set. With `log_dir` the
/// same events are appended to `<log_dir>/webhook.log` without colors.
pub fn init(level: &str, log_dir: Option<&Path>) -> Result<LogHandle> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level '{}'", level))?;

    let stdout_layer = fmt::layer().with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(LOG_FILE)
                .build(dir)
                .with_context(|| format!("Failed to open {}", dir.join(LOG_FILE).display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogHandle { file_guard: guard })
}
