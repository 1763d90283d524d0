//! Watch controller for Tripwire Monitor.
//!
//! The controller owns the filesystem subscription and drives the monitor
//! lifecycle:
//!
//! ```text
//! Idle --start--> Running --interrupt--> Stopped
//!                    |
//!                    +-----crash-------> Stopped
//! ```
//!
//! - **start** validates the root, subscribes and announces itself
//! - **running** routes every [`FileEvent`] through [`route_event`] and sends
//!   at most one alert per event, one event at a time
//! - **stop** (interrupt) and **crash** (unexpected failure) each send their
//!   lifecycle message and then share the same teardown
//!
//! Notification failures never leave the controller: they are logged and the
//! watch carries on.

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::WatchConfig;
use crate::error::{MonitorError, PathError, Result};
use crate::filter::is_monitored;
use crate::notifier::Notifier;
use crate::types::{FileEvent, Notification};
use crate::watcher::{FileWatcher, PathKind};

/// Lifecycle state of a [`WatchController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Not started yet.
    Idle,
    /// Subscribed and processing events.
    Running,
    /// Torn down. Terminal.
    Stopped,
}

/// How a run ended after a successful start.
#[derive(Debug)]
pub enum RunOutcome {
    /// The shutdown signal fired.
    Interrupted,
    /// The watch failed while running.
    Crashed(MonitorError),
}

impl RunOutcome {
    /// Returns true for an interrupt-driven shutdown.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Decides which notification, if any, a file event deserves.
///
/// Only the event's subject path (the destination for renames) is checked
/// against the watched extensions.
#[must_use]
pub fn route_event(event: &FileEvent, config: &WatchConfig) -> Option<Notification> {
    let path = event.subject();
    is_monitored(path, &config.extensions).then(|| Notification::Alert { path: path.clone() })
}

/// Drives a single watch from start to teardown.
#[derive(Debug)]
pub struct WatchController {
    config: WatchConfig,
    notifier: Notifier,
    state: ControllerState,
}

impl WatchController {
    /// Creates an idle controller.
    #[must_use]
    pub fn new(config: WatchConfig, notifier: Notifier) -> Self {
        Self {
            config,
            notifier,
            state: ControllerState::Idle,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// The watch configuration.
    #[must_use]
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Runs the watch until `shutdown` resolves or the watch fails.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Path`] or [`MonitorError::Watch`] if the watch
    /// cannot be started; no notification is sent in that case. Once running,
    /// failures are reported as [`RunOutcome::Crashed`] after the crash
    /// notification and teardown.
    pub async fn run<S>(&mut self, shutdown: S) -> Result<RunOutcome>
    where
        S: Future<Output = ()>,
    {
        self.ensure_idle()?;
        validate_root(&self.config)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let watcher = FileWatcher::new(self.config.root.clone(), self.config.recursive, event_tx)?;

        Ok(self.run_with_events(Some(watcher), event_rx, shutdown).await)
    }

    /// Runs the lifecycle over an already established event source.
    ///
    /// `watcher` is released during teardown when present.
    pub(crate) async fn run_with_events<S>(
        &mut self,
        watcher: Option<FileWatcher>,
        mut event_rx: mpsc::UnboundedReceiver<FileEvent>,
        shutdown: S,
    ) -> RunOutcome
    where
        S: Future<Output = ()>,
    {
        self.start().await;

        let outcome = self.watch_loop(&mut event_rx, shutdown).await;

        match &outcome {
            RunOutcome::Interrupted => self.stop().await,
            RunOutcome::Crashed(err) => self.crash(err).await,
        }

        self.teardown(watcher);
        outcome
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.state == ControllerState::Idle {
            return Ok(());
        }
        Err(MonitorError::Unhandled(format!(
            "controller cannot start from state {:?}",
            self.state
        )))
    }

    async fn start(&mut self) {
        info!(
            root = %self.config.root.display(),
            extensions = ?self.config.extensions,
            "Monitoring started"
        );

        self.dispatch(&Notification::Started).await;
        self.state = ControllerState::Running;
    }

    async fn watch_loop<S>(
        &self,
        event_rx: &mut mpsc::UnboundedReceiver<FileEvent>,
        shutdown: S,
    ) -> RunOutcome
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Monitoring stopped by user");
                    return RunOutcome::Interrupted;
                }

                event = event_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            return RunOutcome::Crashed(MonitorError::Unhandled(
                                "filesystem event stream closed unexpectedly".to_string(),
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Processes one file event, sending an alert if it qualifies.
    pub async fn handle_event(&self, event: FileEvent) {
        match &event {
            FileEvent::Created { path } => info!(path = %path.display(), "New file"),
            FileEvent::Moved { from, to } => info!(
                from = %from.display(),
                to = %to.display(),
                "File renamed/moved"
            ),
        }

        if let Some(alert) = route_event(&event, &self.config) {
            warn!(path = %event.subject().display(), "Detected monitored file");
            self.dispatch(&alert).await;
        }
    }

    async fn stop(&self) {
        self.dispatch(&Notification::Stopped).await;
    }

    async fn crash(&self, err: &MonitorError) {
        error!(error = %err, details = ?err, "Unexpected error");
        self.dispatch(&Notification::Crashed {
            error: err.to_string(),
        })
        .await;
    }

    fn teardown(&mut self, watcher: Option<FileWatcher>) {
        if let Some(watcher) = watcher {
            watcher.close();
        }
        self.state = ControllerState::Stopped;
        info!("Monitoring teardown complete");
    }

    /// Sends a notification; failures are logged and swallowed.
    async fn dispatch(&self, notification: &Notification) {
        match self.notifier.notify(notification).await {
            Ok(()) => debug!(kind = notification.kind(), "Notification delivered"),
            Err(e) => warn!(
                kind = notification.kind(),
                error = %e,
                "Notification failed, continuing"
            ),
        }
    }
}

/// Checks that the watch root exists and is a directory.
fn validate_root(config: &WatchConfig) -> std::result::Result<(), PathError> {
    match PathKind::probe(&config.root) {
        PathKind::Directory => Ok(()),
        PathKind::Missing => {
            error!(root = %config.root.display(), "Folder does not exist");
            Err(PathError::NotFound(config.root.clone()))
        }
        PathKind::File => {
            error!(root = %config.root.display(), "Watch root is not a directory");
            Err(PathError::NotADirectory(config.root.clone()))
        }
    }
}
