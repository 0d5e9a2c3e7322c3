//! Logging setup for filedepot.
//!
//! The depot runs embedded in a host process, so initialization is
//! fallible and idempotent: a subscriber installed by the host wins and
//! `init` reports it as a configuration error instead of panicking.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{DepotError, Result};

/// Parse a configured level string, defaulting to info.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(parse_level(level).into())
}

/// Initialize logging from the depot configuration.
///
/// Output goes to stdout and to the configured log file, which is opened
/// in append mode so restarts keep earlier entries.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let log_path = Path::new(&config.file);
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout.and(Arc::new(log_file)))
                .with_ansi(false)
                .with_target(true),
        )
        .with(level_filter(&config.level))
        .try_init()
        .map_err(|e| DepotError::Config(format!("cannot install log subscriber: {e}")))
}

/// Level-only console logging for tests and ad-hoc tooling.
///
/// Safe to call repeatedly; once a subscriber is installed, later calls
/// are no-ops.
pub fn init_with_level(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(true),
        )
        .with(level_filter(level))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_level_known_values() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("info"), Level::INFO);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("ERROR"), Level::ERROR);
    }

    #[test]
    fn test_parse_level_default() {
        assert_eq!(parse_level("invalid"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_init_is_idempotent_and_creates_log_dir() {
        // First installation wins; repeats must not panic
        init_with_level("warn");
        init_with_level("debug");

        // init prepares the log file even when a subscriber already
        // exists, and reports the clash as a configuration error
        let dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            level: "info".to_string(),
            file: dir
                .path()
                .join("logs/depot.log")
                .to_string_lossy()
                .to_string(),
        };

        let result = init(&config);
        assert!(matches!(result, Err(DepotError::Config(_))));
        assert!(dir.path().join("logs/depot.log").exists());
    }
}
