//! Log sink setup.

use std::{
    io,
    path::{Path, PathBuf},
};

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_subscriber::{filter, fmt, prelude::*, util::TryInitError};

/// Default path of the log file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "./log/logfile";

/// Error initializing logging.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoggingError {
    /// Log file path has no file name.
    #[error("log file path `{0}` has no file name")]
    NoFileName(PathBuf),
    /// Failed creating the log directory.
    #[error("failed creating log directory `{path}`")]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Failed opening the log file.
    #[error("failed opening log file")]
    Open(#[from] InitError),
    /// A global subscriber is already installed.
    #[error("failed installing global subscriber")]
    Install(#[from] TryInitError),
}

/// Installs the global `tracing` subscriber writing to the specified file in append mode.
///
/// The log file and its directory are created if necessary. Log level is controlled with
/// the `RUST_LOG` env variable and defaults to `info`. The returned guard must be held
/// until the process exits; dropping it flushes buffered logs.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened, or if a global subscriber is already set.
pub fn init(path: &Path) -> Result<WorkerGuard, LoggingError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::NoFileName(path.to_owned()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
        path: dir.to_owned(),
        source,
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let env_filter = filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy();
    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()?;
    Ok(guard)
}
