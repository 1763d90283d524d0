//! Telegram notifier for Tripwire Monitor.
//!
//! Posts MarkdownV2 messages to `POST <api>/bot<token>/sendMessage`. Every call
//! is a single attempt:
//!
//! - HTTP 200 is success
//! - any other status is [`NotifyError::BadResponse`] carrying the response body
//! - connection, DNS and timeout failures are [`NotifyError::Transport`]
//!
//! Failures are logged here; callers decide whether to care. Nothing is retried,
//! buffered or rate limited.
//!
//! # Example
//!
//! ```no_run
//! use tripwire_monitor::notifier::{Notifier, NotifierConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = NotifierConfig::new("123456:ABC-token".to_string(), "-100200".to_string());
//!     let notifier = Notifier::new(config).unwrap();
//!
//!     if let Err(e) = notifier.send("*hello*").await {
//!         eprintln!("notification failed: {e}");
//!     }
//! }
//! ```

use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::types::{Notification, NotificationMessage};

/// Default Bot API base URL.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Errors that can occur when sending a notification.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The API answered with a status other than 200.
    #[error("bad response from messaging API: {status} - {body}")]
    BadResponse { status: u16, body: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Configuration for the notifier.
#[derive(Clone)]
pub struct NotifierConfig {
    /// API base URL without trailing path (e.g., `https://api.telegram.org`).
    pub api_url: String,

    /// Bot token, placed in the request path.
    pub bot_token: String,

    /// Destination chat id.
    pub chat_id: String,

    /// Optional per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl NotifierConfig {
    /// Creates a configuration targeting the public Bot API with no timeout.
    #[must_use]
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            bot_token,
            chat_id,
            timeout: None,
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Sets a per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full `sendMessage` endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_url.trim_end_matches('/'),
            self.bot_token
        )
    }
}

// The token is a credential; keep it out of logs.
impl fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("api_url", &self.api_url)
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Sends messages to a single Telegram chat.
#[derive(Debug, Clone)]
pub struct Notifier {
    config: NotifierConfig,
    client: Client,
}

impl Notifier {
    /// Creates a new notifier.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: NotifierConfig) -> Result<Self, NotifyError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { config, client })
    }

    /// Returns the notifier configuration.
    #[must_use]
    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Sends already-formatted MarkdownV2 `text` to the configured chat.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::BadResponse`] for any non-200 status and
    /// [`NotifyError::Transport`] when no response was received.
    pub async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let message = NotificationMessage::markdown_v2(self.config.chat_id.clone(), text);

        debug!(chat_id = %message.chat_id, "Sending notification");

        let result = self
            .client
            .post(self.config.endpoint())
            .json(&message)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                if status == StatusCode::OK {
                    info!("Notification sent successfully");
                    return Ok(());
                }

                let body = body_or_read_error(response.text().await);
                error!(
                    status = status.as_u16(),
                    body = %body,
                    "Failed to send notification"
                );
                Err(NotifyError::BadResponse {
                    status: status.as_u16(),
                    body,
                })
            }
            Err(e) => {
                error!(
                    error = %e,
                    chain = %error_chain(&e),
                    backtrace = %Backtrace::force_capture(),
                    "Error sending notification"
                );
                Err(NotifyError::Transport(e))
            }
        }
    }

    /// Renders and sends `notification`.
    ///
    /// # Errors
    ///
    /// See [`Notifier::send`].
    pub async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        debug!(kind = notification.kind(), "Dispatching notification");
        self.send(&notification.text()).await
    }
}

/// Returns the response body, or a description of why it could not be read.
fn body_or_read_error<E: fmt::Display>(body: Result<String, E>) -> String {
    match body {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Failed to read response body");
            format!("<unreadable response body: {e}>")
        }
    }
}

/// Joins an error and all of its sources into one line.
fn error_chain(err: &dyn StdError) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_format() {
        let config = NotifierConfig::new("123:abc".to_string(), "42".to_string());
        assert_eq!(
            config.endpoint(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = NotifierConfig::new("t".to_string(), "42".to_string())
            .with_api_url("http://127.0.0.1:9000/");
        assert_eq!(config.endpoint(), "http://127.0.0.1:9000/bott/sendMessage");
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = NotifierConfig::new("secret-token".to_string(), "42".to_string());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_defaults_have_no_timeout() {
        let config = NotifierConfig::new("t".to_string(), "42".to_string());
        assert!(config.timeout.is_none());
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_bad_response_display() {
        let err = NotifyError::BadResponse {
            status: 400,
            body: "Bad Request: can't parse entities".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "bad response from messaging API: 400 - Bad Request: can't parse entities"
        );
    }

    #[test]
    fn test_error_chain_single() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(error_chain(&err), "boom");
    }

    #[test]
    fn test_body_or_read_error_keeps_body() {
        let body: Result<String, std::io::Error> = Ok("Too Many Requests".to_string());
        assert_eq!(body_or_read_error(body), "Too Many Requests");
    }

    #[test]
    fn test_body_or_read_error_describes_failure() {
        let body: Result<String, std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed mid-body",
        ));
        assert_eq!(
            body_or_read_error(body),
            "<unreadable response body: connection closed mid-body>"
        );
    }
}
