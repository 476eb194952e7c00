//! Logging setup: console output plus the daemon log file.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, Result};

/// File name of the daemon log inside the log directory.
pub const DAEMON_LOG_FILE: &str = "hera.log";

/// Open `<log_dir>/hera.log` for appending, creating the directory if needed.
pub fn daemon_log_appender(log_dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(DAEMON_LOG_FILE)
        .build(log_dir)
        .map_err(|e| {
            Error::Config(format!(
                "Cannot open log file in {}: {e}",
                log_dir.display()
            ))
        })
}

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- default `RUST_LOG` value when the env-var is not set
///   (e.g. `"hera_daemon=info,hera_core=info"`).
/// * `log_json` -- JSON console lines instead of the human-readable format.
/// * `log_dir` -- when set, every event is also appended, without ANSI colours,
///   to `<log_dir>/hera.log`.
///
/// The returned guard flushes the file writer on drop; hold it for the
/// lifetime of the process. A log file that cannot be opened is reported as a
/// warning and console logging carries on alone.
pub fn init_tracing(
    default_filter: &str,
    log_json: bool,
    log_dir: Option<&Path>,
) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()));

    let console = if log_json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };

    let (file, guard, file_error) = match log_dir.map(daemon_log_appender) {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard), None)
        }
        Some(Err(e)) => (None, None, Some(e)),
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "Daemon log file disabled");
    }
    guard
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn appender_writes_hera_log_in_new_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("var").join("log").join("hera");

        let mut appender = daemon_log_appender(&log_dir).unwrap();
        appender.write_all(b"tunnel started\n").unwrap();
        appender.flush().unwrap();

        let content = std::fs::read_to_string(log_dir.join(DAEMON_LOG_FILE)).unwrap();
        assert_eq!(content, "tunnel started\n");
    }

    #[test]
    fn appender_appends_to_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DAEMON_LOG_FILE), "earlier\n").unwrap();

        let mut appender = daemon_log_appender(dir.path()).unwrap();
        appender.write_all(b"later\n").unwrap();
        appender.flush().unwrap();

        let content = std::fs::read_to_string(dir.path().join(DAEMON_LOG_FILE)).unwrap();
        assert_eq!(content, "earlier\nlater\n");
    }

    #[test]
    fn appender_fails_when_log_dir_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("hera");
        std::fs::write(&blocker, "").unwrap();

        assert!(daemon_log_appender(&blocker).is_err());
    }
}
