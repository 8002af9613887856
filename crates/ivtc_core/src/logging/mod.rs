//! Logging infrastructure.
//!
//! - [`init_tracing`]: process-wide `tracing` subscriber, optionally also
//!   writing a daily rolling file
//! - [`RunLogger`]: per-run log file with compact progress and an error tail
//!
//! # Example
//!
//! ```no_run
//! use ivtc_core::logging::{LogConfig, RunLogger};
//!
//! let logger = RunLogger::new("replay_ep01", ".logs", LogConfig::default(), None).unwrap();
//! logger.phase("Replay");
//! logger.progress(120, 240);
//! logger.success("Script written");
//! ```

mod run_logger;
mod types;

use std::path::Path;

pub use run_logger::RunLogger;
pub use types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name prefix of the rolling log.
const LOG_FILE_PREFIX: &str = "ivtc.log";

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`. With `log_dir` set,
/// events are also appended to a daily file there; keep the returned guard
/// alive until exit so buffered lines are flushed. Calling this twice is a
/// no-op.
pub fn init_tracing(default_level: LogLevel, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false),
        )
        .with(file_layer)
        .with(filter)
        .try_init();

    if installed.is_err() {
        return None;
    }
    guard
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn level_to_filter_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_to_filter_works() {
        assert_eq!(level_to_filter_str(LogLevel::Debug), "debug");
        assert_eq!(level_to_filter_str(LogLevel::Info), "info");
    }

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(LogLevel::Info.raised_by(0), LogLevel::Info);
        assert_eq!(LogLevel::Info.raised_by(1), LogLevel::Debug);
        assert_eq!(LogLevel::Warn.raised_by(9), LogLevel::Trace);
    }

    #[test]
    fn level_parses_lowercase() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            level: LogLevel,
        }
        let parsed: Wrapper = toml::from_str("level = \"debug\"").unwrap();
        assert_eq!(parsed.level, LogLevel::Debug);
        init_test_tracing();
    }
}
