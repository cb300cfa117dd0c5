use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "EDU_INVENTORY_LOG";
pub const DEFAULT_LOG_FILTER: &str = "edu_inventory=info,sqlx=warn";
pub const LOG_FILE_PREFIX: &str = "edu-inventory";

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn file_appender(logs_dir: &Path) -> Result<RollingFileAppender, String> {
    std::fs::create_dir_all(logs_dir).map_err(|e| e.to_string())?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(logs_dir)
        .map_err(|e| e.to_string())
}

/// Install the global subscriber: JSON lines on stderr, plus a daily-rotated
/// file under `logs_dir` when one is given. Keep the returned guard alive for
/// as long as file output is wanted.
///
/// Calling this twice is harmless; the second subscriber is discarded.
pub fn init_logging(logs_dir: Option<&Path>) -> Option<WorkerGuard> {
    let _ = tracing_log::LogTracer::init();

    let stderr_layer = fmt::layer()
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stderr);

    let mut file_error = None;
    let (file_layer, guard) = match logs_dir.map(file_appender) {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_target(true)
                .with_ansi(false)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Some(Err(err)) => {
            file_error = Some(err);
            (None, None)
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if let Some(error) = file_error {
        tracing::warn!(
            target: "edu_inventory",
            event = "log_file_unavailable",
            error = %error
        );
    }
    guard
}

