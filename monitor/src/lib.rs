//! Tripwire Monitor - watches a directory tree for unwanted files.
//!
//! This crate watches a root directory recursively and sends a Telegram
//! message whenever a file with a watched extension is created or renamed
//! into place. Start, stop and crash transitions are announced on the same
//! channel.
//!
//! # Overview
//!
//! ```text
//! notify backend --> watcher --> controller --> filter --> escape --> notifier --> Bot API
//! ```
//!
//! Each event is handled on its own; nothing is persisted, deduplicated,
//! rate limited or retried.
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`controller`]: Watch lifecycle and event routing
//! - [`error`]: Error types for monitor operations
//! - [`escape`]: MarkdownV2 escaping
//! - [`filter`]: Extension matching
//! - [`logging`]: Per-run log file and console mirror
//! - [`notifier`]: Telegram Bot API client
//! - [`types`]: File events and notification messages
//! - [`watcher`]: File system watcher

pub mod config;
pub mod controller;
pub mod error;
pub mod escape;
pub mod filter;
pub mod logging;
pub mod notifier;
pub mod types;
pub mod watcher;

pub use config::{Config, ConfigError, Environment, LogConfig, WatchConfig};
pub use controller::{route_event, ControllerState, RunOutcome, WatchController};
pub use error::{MonitorError, PathError, Result};
pub use escape::escape_markdown_v2;
pub use filter::is_monitored;
pub use notifier::{Notifier, NotifierConfig, NotifyError};
pub use types::{FileEvent, Notification, NotificationMessage, ParseMode};
pub use watcher::{FileWatcher, WatcherError};
