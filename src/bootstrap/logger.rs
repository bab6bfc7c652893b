//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the effective level is resolved.

use std::path::Path;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::core::error::AppError;

/// Initialise the global tracing subscriber.
///
/// `level` accepts a level (`"warn"`) or a full filter directive
/// (`"ledger_boot=debug,reqwest=warn"`).
///
/// With `prefer_level` set (a `-v` flag was given), `level` wins and
/// `RUST_LOG` is only the fallback for an unparsable `level`. Otherwise
/// `RUST_LOG` wins and `level` is the fallback.
///
/// Output goes to `log_file` (appended) when given, else stderr, so stdout
/// stays free for reports.
pub fn init(level: &str, prefer_level: bool, log_file: Option<&Path>) -> Result<(), AppError> {
    let filter = if prefer_level {
        match EnvFilter::try_new(level) {
            Ok(filter) => filter,
            Err(level_err) => EnvFilter::try_from_default_env().map_err(|env_err| {
                AppError::Logger(format!(
                    "invalid log level '{level}': {level_err}; RUST_LOG parse failed: {env_err}"
                ))
            })?,
        }
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))?
    };

    let writer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AppError::Logger(format!("failed to open log file '{}': {e}", path.display()))
                })?;
            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(())
}

/// Map a count of `-v` flags to a level. Each flag raises verbosity one tier:
///
/// - `-v`: warn
/// - `-vv`: info
/// - `-vvv`: debug
/// - `-vvvv` and up: trace
pub fn verbosity_level(count: u8) -> Option<&'static str> {
    match count {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn verbosity_tiers() {
        assert_eq!(verbosity_level(0), None);
        assert_eq!(verbosity_level(1), Some("warn"));
        assert_eq!(verbosity_level(3), Some("debug"));
        assert_eq!(verbosity_level(9), Some("trace"));
    }

    #[test]
    fn unopenable_log_file_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing/dir/boot.log");
        let err = init("info", true, Some(&path)).unwrap_err();
        assert!(err.to_string().contains("failed to open log file"));
    }

    #[test]
    fn init_info_succeeds_or_already_init() {
        // Another test may have installed the global subscriber first.
        match init("info", false, None) {
            Ok(()) => {}
            Err(AppError::Logger(msg)) if msg.contains("set subscriber") => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
