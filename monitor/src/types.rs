//! Event and message types for Tripwire Monitor.
//!
//! [`FileEvent`]s come out of the filesystem adapter, [`Notification`]s describe
//! what should be announced, and [`NotificationMessage`] is the JSON body posted
//! to the Telegram Bot API.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::escape::escape_markdown_v2;

/// A filesystem change relevant to monitoring.
///
/// Paths carried here never point at directories; directory events are
/// discarded by the watcher before they are forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// A new file appeared in the watched tree.
    Created {
        /// Path of the new file.
        path: PathBuf,
    },

    /// A file was renamed or moved within the watched tree.
    Moved {
        /// Path before the rename.
        from: PathBuf,
        /// Path after the rename.
        to: PathBuf,
    },
}

impl FileEvent {
    /// Returns the path that decides whether the event is interesting.
    ///
    /// For renames this is the destination.
    #[must_use]
    pub fn subject(&self) -> &PathBuf {
        match self {
            Self::Created { path } => path,
            Self::Moved { to, .. } => to,
        }
    }
}

/// Message formatting dialect understood by the Bot API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    /// Telegram MarkdownV2.
    MarkdownV2,
}

/// Something the monitor announces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Monitoring has started.
    Started,

    /// Monitoring was stopped by an interrupt.
    Stopped,

    /// Monitoring failed unexpectedly.
    Crashed {
        /// Human-readable error message (unescaped).
        error: String,
    },

    /// A file with a watched extension was detected.
    Alert {
        /// The detected file (unescaped).
        path: PathBuf,
    },
}

impl Notification {
    /// Renders the MarkdownV2 text for this notification.
    ///
    /// Template wording is sent as-is; the error message and path are escaped.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Started => "*ℹ️ File monitor started ℹ️*".to_string(),
            Self::Stopped => "*🛑 File monitor stopped by user 🛑*".to_string(),
            Self::Crashed { error } => {
                format!(
                    "*⚠️ File monitor crashed ⚠️*\n\n{}",
                    escape_markdown_v2(error)
                )
            }
            Self::Alert { path } => format!(
                "*⚠️ Alert\\! A new monitored file was detected ⚠️*\n\n{}",
                escape_markdown_v2(&path.to_string_lossy())
            ),
        }
    }

    /// Short label used in log records.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Crashed { .. } => "crashed",
            Self::Alert { .. } => "alert",
        }
    }
}

/// Request body for `POST /bot<token>/sendMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Destination chat.
    pub chat_id: String,

    /// Already-formatted message text.
    pub text: String,

    /// Formatting dialect of `text`.
    pub parse_mode: ParseMode,
}

impl NotificationMessage {
    /// Creates a MarkdownV2 message for `chat_id`.
    #[must_use]
    pub fn markdown_v2(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            parse_mode: ParseMode::MarkdownV2,
        }
    }
}
