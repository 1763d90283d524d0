//! Logging setup for Tripwire Monitor.
//!
//! Every process start writes to a fresh file
//! `<LOG_FOLDER>/file-monitor-<YYYY-MM-DD_HH-MM-SS>.log`. With `--verbose` the
//! same records are mirrored to the console. `RUST_LOG` overrides the level
//! taken from configuration.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};
use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};

use crate::config::LogConfig;

/// Prefix of every log file name.
pub const LOG_FILE_PREFIX: &str = "file-monitor";

/// Timestamp format inside log records.
const RECORD_TIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Timestamp format inside log file names.
const FILE_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Local wall-clock timestamps for log records.
#[derive(Debug, Clone, Copy, Default)]
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format(RECORD_TIME_FORMAT))
    }
}

/// Name of the log file for a run started at `started`.
#[must_use]
pub fn log_file_name(started: NaiveDateTime) -> String {
    format!("{LOG_FILE_PREFIX}-{}.log", started.format(FILE_TIME_FORMAT))
}

/// Creates `folder` if needed and opens the run's log file for appending.
///
/// # Errors
///
/// Returns an I/O error if the folder or file cannot be created.
pub fn create_log_file(folder: &Path, started: NaiveDateTime) -> io::Result<(PathBuf, File)> {
    fs::create_dir_all(folder)?;
    let path = folder.join(log_file_name(started));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Default filter directives for a configured level.
///
/// HTTP internals stay at `info` even when the monitor logs at `debug`.
#[must_use]
pub fn default_directives(level: Level) -> String {
    let base = level.as_str().to_ascii_lowercase();
    if level >= Level::DEBUG {
        format!("{base},hyper=info,hyper_util=info,reqwest=info")
    } else {
        base
    }
}

/// Initializes the global tracing subscriber.
///
/// Returns the path of the log file for this run.
///
/// # Errors
///
/// Returns an I/O error if the log file cannot be created.
pub fn init(config: &LogConfig, console: bool) -> io::Result<PathBuf> {
    let (path, file) = create_log_file(&config.folder, Local::now().naive_local())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config.level)));

    // Source locations only at debug and below.
    let with_location = config.level >= Level::DEBUG;

    let file_layer = tracing_fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_timer(LocalTime)
        .with_target(true)
        .with_level(true)
        .with_file(with_location)
        .with_line_number(with_location);

    let console_layer = console.then(|| {
        tracing_fmt::layer()
            .with_timer(LocalTime)
            .with_target(true)
            .with_level(true)
            .with_file(with_location)
            .with_line_number(with_location)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(path)
}
