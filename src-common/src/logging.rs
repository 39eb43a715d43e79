//! Logging bootstrap.
//!
//! Applications call [`init_logging`] once at startup. Events go to stderr and
//! to a daily-rolling file under [`log_dir`]. Verbosity follows `RUST_LOG`
//! and defaults to `info`.

use crate::paths;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Error raised while installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

pub use paths::log_dir;

/// Ensures the log directory exists, creating it if necessary.
pub fn ensure_log_dir() -> Result<PathBuf, LoggingError> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir).map_err(|source| LoggingError::CreateDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}

/// Returns the base path for an application log file.
///
/// The rolling appender uses this path's parent directory and creates dated
/// files (e.g. `framecap-app.2026-10-19.log`).
pub fn app_log_path(file_prefix: &str) -> PathBuf {
    log_dir().join(format!("{}.log", file_prefix))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped, so keep it alive
/// for the lifetime of the process.
pub fn init_logging(file_prefix: &str) -> Result<WorkerGuard, LoggingError> {
    let dir = ensure_log_dir()?;
    let appender = tracing_appender::rolling::daily(&dir, format!("{}.log", file_prefix));
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()?;

    tracing::info!(log_dir = %dir.display(), "Logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_log_path_uses_prefix() {
        let path = app_log_path("framecap-test");
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("framecap-test.log")
        );
        assert_eq!(path.parent(), Some(log_dir().as_path()));
    }

    #[test]
    fn test_default_filter_is_info() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(env_filter().to_string(), "info");
        }
    }
}
