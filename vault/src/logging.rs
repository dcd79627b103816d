//! Tracing subscriber setup shared by hosts

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Result, VaultError};

/// File name prefix of the rolling log files
pub const LOG_FILE_PREFIX: &str = "contact-vault.log";

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level. When a log directory is set,
/// JSON lines also go to a daily-rolling file; keep the returned guard alive
/// for as long as logs should be flushed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(format!(
                "contact_vault={0},contactctl={0},contactctl_cli={0}",
                config.level
            ))
        })
        .map_err(|e| VaultError::Logging(e.to_string()))?;

    let (console_text, console_json) = match (config.console, config.format) {
        (false, _) => (None, None),
        (true, LogFormat::Text) => (
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
            None,
        ),
        (true, LogFormat::Json) => (None, Some(fmt::layer().json().with_writer(std::io::stderr))),
    };

    let (file_layer, guard) = match &config.file_path {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().json().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_text)
        .with(console_json)
        .with(file_layer)
        .try_init()
        .map_err(|e| VaultError::Logging(e.to_string()))?;

    Ok(guard)
}
