//! Error types for Tripwire Monitor.
//!
//! Startup failures ([`ConfigError`], [`PathError`], subscription setup) are
//! fatal and end the process before watching begins. Notification failures
//! ([`NotifyError`]) are logged and swallowed by the controller. Anything that
//! breaks the running watch is reported as [`MonitorError::Unhandled`] and
//! triggers the crash path.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::notifier::NotifyError;
use crate::watcher::WatcherError;

/// Errors that can occur during monitor operations.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The configured watch root is unusable.
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// The filesystem subscription could not be established.
    #[error("file watch error: {0}")]
    Watch(#[from] WatcherError),

    /// A notification could not be delivered.
    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Failure while the watch was running.
    #[error("unhandled error: {0}")]
    Unhandled(String),
}

/// Errors about the watch root.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Nothing exists at the configured root.
    #[error("folder does not exist: {0}")]
    NotFound(PathBuf),

    /// The configured root is a file.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// A specialized `Result` type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
