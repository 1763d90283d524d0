//! Tripwire Monitor - directory watcher with Telegram alerts.
//!
//! This binary loads a dotenv file for the selected environment, validates the
//! configuration, sets up logging and then watches the configured folder until
//! interrupted.
//!
//! # Environment Variables
//!
//! See the [`config`](tripwire_monitor::config) module for available options.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use tripwire_monitor::config::{Config, Environment};
use tripwire_monitor::controller::{RunOutcome, WatchController};
use tripwire_monitor::logging;
use tripwire_monitor::notifier::Notifier;

/// Tripwire Monitor - intrusive file monitor.
///
/// Watches a folder recursively and sends a Telegram alert whenever a file
/// with a watched extension appears.
#[derive(Parser, Debug)]
#[command(name = "tripwire-monitor")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    TELEGRAM_BOT_TOKEN     Bot token (required)
    TELEGRAM_CHAT_ID       Destination chat id (required)
    FOLDER_MONITOR_LIVE    Folder watched with --env live (required)
    FOLDER_MONITOR_DEV     Folder watched with --env dev (required)
    FILE_EXTENSIONS        Comma-separated extensions, e.g. .exe,.bat (required)
    LOG_TYPE               DEBUG, INFO, WARNING or ERROR (required)
    LOG_FOLDER             Directory for log files (required)
    TELEGRAM_API_URL       Bot API base URL (default: https://api.telegram.org)
    NOTIFY_TIMEOUT_SECS    Per-request timeout (default: none)

EXAMPLES:
    # Watch the dev folder, logging to the console as well
    tripwire-monitor --env dev --verbose

    # Watch the live folder with an explicit dotenv file
    tripwire-monitor --env live --env-file /etc/tripwire/dot-env
")]
struct Cli {
    /// Deployment environment.
    #[arg(short, long, value_enum)]
    env: Environment,

    /// Mirror log output to the console.
    #[arg(short, long)]
    verbose: bool,

    /// Dotenv file to load instead of the environment's default.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

/// Result of trying to load the dotenv file, reported once logging is up.
enum EnvFileStatus {
    Loaded(PathBuf),
    Unavailable(PathBuf, dotenvy::Error),
}

/// A startup or runtime failure that ends the process.
#[derive(Debug)]
enum Fatal {
    /// Failed before the log file existed; only stderr can report it.
    BeforeLogging(anyhow::Error),
    /// Failed with logging in place.
    Logged(anyhow::Error),
}

impl Fatal {
    fn report(&self) {
        match self {
            Self::BeforeLogging(e) => eprintln!("Error: {e:#}"),
            Self::Logged(e) => error!("Fatal error: {e:#}"),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(fatal) => {
            fatal.report();
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> std::result::Result<ExitCode, Fatal> {
    let env_file_status = load_env_file(&cli);

    let config = Config::from_env(cli.env)
        .context("Failed to load configuration")
        .map_err(Fatal::BeforeLogging)?;

    let log_path = logging::init(&config.log, cli.verbose)
        .with_context(|| {
            format!(
                "Failed to create log file in {}",
                config.log.folder.display()
            )
        })
        .map_err(Fatal::BeforeLogging)?;

    monitor(config, &log_path, env_file_status).map_err(Fatal::Logged)
}

/// Runs the monitor once logging is up.
fn monitor(config: Config, log_path: &Path, env_file_status: EnvFileStatus) -> Result<ExitCode> {
    info!(
        log_file = %log_path.display(),
        environment = %config.environment,
        "Starting Tripwire Monitor"
    );

    match env_file_status {
        EnvFileStatus::Loaded(path) => info!(path = %path.display(), "Loaded dotenv file"),
        EnvFileStatus::Unavailable(path, e) => {
            warn!(path = %path.display(), error = %e, "Dotenv file not loaded");
        }
    }

    info!(
        root = %config.watch.root.display(),
        extensions = ?config.watch.extensions,
        api_url = %config.notifier.api_url,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let outcome = runtime.block_on(run_monitor(config))?;

    match outcome {
        RunOutcome::Interrupted => {
            info!("Monitor stopped");
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Crashed(e) => {
            error!(error = %e, "Monitor crashed");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Runs the watch until interrupted.
async fn run_monitor(config: Config) -> Result<RunOutcome> {
    let notifier = Notifier::new(config.notifier).context("Failed to create HTTP client")?;
    let mut controller = WatchController::new(config.watch, notifier);

    info!("Monitor running. Press Ctrl+C to stop.");

    let outcome = controller
        .run(wait_for_shutdown())
        .await
        .context("Failed to start monitoring")?;

    Ok(outcome)
}

/// Loads the dotenv file without overriding variables already set.
fn load_env_file(cli: &Cli) -> EnvFileStatus {
    let path = cli
        .env_file
        .clone()
        .unwrap_or_else(|| cli.env.default_env_file());

    match dotenvy::from_path(&path) {
        Ok(()) => EnvFileStatus::Loaded(path),
        Err(e) => EnvFileStatus::Unavailable(path, e),
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
