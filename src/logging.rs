//! Logging initialization for showrunner.
//!
//! `serve` with `logging.to_file`: logs to `{state}/logs/showrunner-{datetime}.log`
//! Everything else: logs to stderr

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Guard that must be kept alive for the duration of the program.
    /// When dropped, ensures all buffered logs are flushed.
    pub _guard: Option<WorkerGuard>,

    /// Path to the log file (only set when logging to a file)
    pub log_file_path: Option<PathBuf>,
}

/// File name for a log started at the given instant
pub fn log_file_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("showrunner-{}.log", now.format("%Y%m%dT%H%M%SZ"))
}

/// Whether this invocation should write to a log file
pub fn wants_file(config: &Config, is_server: bool) -> bool {
    is_server && config.logging.to_file
}

/// Initialize logging based on mode and configuration.
///
/// # Arguments
/// * `config` - Application configuration
/// * `is_server` - Whether running the long-lived REST server
/// * `debug_override` - If true, override log level to "debug" (from --debug flag)
pub fn init_logging(
    config: &Config,
    is_server: bool,
    debug_override: bool,
) -> Result<LoggingHandle> {
    let log_level = if debug_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };

    let filter = tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or(log_level));

    if wants_file(config, is_server) {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)?;

        let log_filename = log_file_name(chrono::Utc::now());
        let log_file_path = logs_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&logs_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.state = temp_dir.path().to_string_lossy().to_string();
        config
    }

    #[test]
    fn test_logs_path_created_under_state() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let logs_dir = config.logs_path();
        assert!(logs_dir.ends_with("logs"));
        assert!(logs_dir.starts_with(temp_dir.path()));
    }

    #[test]
    fn test_log_file_name_format() {
        let at = chrono::Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(log_file_name(at), "showrunner-20260309T140500Z.log");
    }

    #[test]
    fn test_cli_commands_never_log_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.logging.to_file = true;

        assert!(!wants_file(&config, false));
        assert!(wants_file(&config, true));
    }

    #[test]
    fn test_server_with_file_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        assert!(!wants_file(&config, true));
    }
}
