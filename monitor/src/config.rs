//! Configuration module for Tripwire Monitor.
//!
//! This module handles parsing configuration from environment variables. The
//! values are usually supplied through a dotenv file loaded by the binary.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `TELEGRAM_BOT_TOKEN` | Yes | - | Bot token used in the API path |
//! | `TELEGRAM_CHAT_ID` | Yes | - | Chat receiving notifications |
//! | `FOLDER_MONITOR_LIVE` | Yes | - | Watch root for the `live` environment |
//! | `FOLDER_MONITOR_DEV` | Yes | - | Watch root for the `dev` environment |
//! | `FILE_EXTENSIONS` | Yes | - | Comma-separated extensions (e.g. `.exe,.bat`) |
//! | `LOG_TYPE` | Yes | - | Log level (`DEBUG`, `INFO`, `WARNING`, `ERROR`) |
//! | `LOG_FOLDER` | Yes | - | Directory for per-run log files |
//! | `TELEGRAM_API_URL` | No | `https://api.telegram.org` | Bot API base URL |
//! | `NOTIFY_TIMEOUT_SECS` | No | (none) | Timeout for each notification request |
//!
//! # Example
//!
//! ```no_run
//! use tripwire_monitor::config::{Config, Environment};
//!
//! let config = Config::from_env(Environment::Dev).expect("Failed to load configuration");
//! println!("Watching: {}", config.watch.root.display());
//! ```

use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use thiserror::Error;
use tracing::Level;

use crate::filter::normalize_extension;
use crate::notifier::{NotifierConfig, DEFAULT_API_URL};

pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_FOLDER_LIVE: &str = "FOLDER_MONITOR_LIVE";
pub const ENV_FOLDER_DEV: &str = "FOLDER_MONITOR_DEV";
pub const ENV_FILE_EXTENSIONS: &str = "FILE_EXTENSIONS";
pub const ENV_LOG_TYPE: &str = "LOG_TYPE";
pub const ENV_LOG_FOLDER: &str = "LOG_FOLDER";
pub const ENV_API_URL: &str = "TELEGRAM_API_URL";
pub const ENV_NOTIFY_TIMEOUT: &str = "NOTIFY_TIMEOUT_SECS";

/// Variables that must be present and non-empty.
pub const REQUIRED_VARS: [&str; 7] = [
    ENV_BOT_TOKEN,
    ENV_CHAT_ID,
    ENV_FOLDER_LIVE,
    ENV_FOLDER_DEV,
    ENV_FILE_EXTENSIONS,
    ENV_LOG_TYPE,
    ENV_LOG_FOLDER,
];

/// Dotenv file used by the `live` deployment.
const LIVE_ENV_FILE: &str = "/root/scripts/file-monitor-script/dot-env";

/// Dotenv file used by the `dev` deployment, relative to the working directory.
const DEV_ENV_FILE: &str = "dot-env";

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more required environment variables are missing or empty.
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),

    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Deployment environment selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    /// Production host.
    Live,
    /// Local development.
    Dev,
}

impl Environment {
    /// Variable holding the watch root for this environment.
    #[must_use]
    pub fn root_var(self) -> &'static str {
        match self {
            Self::Live => ENV_FOLDER_LIVE,
            Self::Dev => ENV_FOLDER_DEV,
        }
    }

    /// Dotenv file loaded when no explicit file is given.
    #[must_use]
    pub fn default_env_file(self) -> PathBuf {
        match self {
            Self::Live => PathBuf::from(LIVE_ENV_FILE),
            Self::Dev => PathBuf::from(DEV_ENV_FILE),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Dev => f.write_str("dev"),
        }
    }
}

/// What to watch.
///
/// Immutable once the controller starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Root directory of the watched tree.
    pub root: PathBuf,

    /// Watched extensions, lower-cased with a leading dot.
    pub extensions: HashSet<String>,

    /// Whether subdirectories are watched. Always true for the daemon.
    pub recursive: bool,
}

impl WatchConfig {
    /// Creates a recursive watch configuration, normalizing `extensions`.
    pub fn new<I, S>(root: impl Into<PathBuf>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            root: root.into(),
            extensions: extensions
                .into_iter()
                .filter_map(|ext| normalize_extension(ext.as_ref()))
                .collect(),
            recursive: true,
        }
    }
}

/// Where and how verbosely to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Maximum level recorded.
    pub level: Level,

    /// Directory that receives one log file per run.
    pub folder: PathBuf,
}

/// Configuration for Tripwire Monitor.
#[derive(Debug, Clone)]
pub struct Config {
    /// Selected deployment environment.
    pub environment: Environment,

    /// Messaging API settings.
    pub notifier: NotifierConfig,

    /// Watch root and extensions.
    pub watch: WatchConfig,

    /// Logging settings.
    pub log: LogConfig,
}

impl Config {
    /// Creates a new `Config` by reading process environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if any required variable is missing or empty, or
    /// if a value cannot be parsed.
    pub fn from_env(environment: Environment) -> Result<Self, ConfigError> {
        Self::from_lookup(environment, |key| env::var(key).ok())
    }

    /// Creates a new `Config` from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(environment: Environment, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| value(*key).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnvVars(missing));
        }

        let require = |key: &str| {
            value(key).ok_or_else(|| ConfigError::MissingEnvVars(vec![key.to_string()]))
        };

        let bot_token = require(ENV_BOT_TOKEN)?;
        let chat_id = require(ENV_CHAT_ID)?;
        let root = PathBuf::from(require(environment.root_var())?);

        let raw_extensions = require(ENV_FILE_EXTENSIONS)?;
        let extensions = parse_extensions(&raw_extensions);
        if extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: ENV_FILE_EXTENSIONS.to_string(),
                message: format!("no extensions in '{raw_extensions}'"),
            });
        }

        let level = parse_log_level(&require(ENV_LOG_TYPE)?);
        let folder = PathBuf::from(require(ENV_LOG_FOLDER)?);

        let api_url = value(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout = match value(ENV_NOTIFY_TIMEOUT) {
            Some(val) => {
                let secs = val
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: ENV_NOTIFY_TIMEOUT.to_string(),
                        message: format!("expected positive integer, got '{val}'"),
                    })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_NOTIFY_TIMEOUT.to_string(),
                        message: "timeout must be at least 1 second".to_string(),
                    });
                }
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            environment,
            notifier: NotifierConfig::new(bot_token, chat_id)
                .with_api_url(api_url)
                .with_timeout(timeout),
            watch: WatchConfig {
                root,
                extensions,
                recursive: true,
            },
            log: LogConfig { level, folder },
        })
    }
}

/// Parses a comma-separated extension list into a normalized set.
#[must_use]
pub fn parse_extensions(raw: &str) -> HashSet<String> {
    raw.split(',').filter_map(normalize_extension).collect()
}

/// Maps a `LOG_TYPE` value to a tracing level. Unknown values mean `INFO`.
#[must_use]
pub fn parse_log_level(raw: &str) -> Level {
    match raw.trim().to_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" | "CRITICAL" => Level::ERROR,
        _ => Level::INFO,
    }
}
