//! Filesystem watcher for Tripwire Monitor.
//!
//! This module subscribes to create and rename events under a root directory
//! and forwards them as [`FileEvent`]s.
//!
//! # Architecture
//!
//! The watcher uses the [`notify`] crate. Its callback runs on the backend
//! thread and is kept lightweight: it translates raw events and hands them to
//! the async side through an unbounded channel. Events queue up while a
//! notification is in flight and none are dropped.
//!
//! Renames arrive as separate `From`/`To` halves linked by a tracker id. The
//! callback remembers the `From` half and emits a single [`FileEvent::Moved`]
//! when the matching `To` arrives. A `To` without a `From` (a file moved in from
//! outside the tree) is reported as [`FileEvent::Created`]. Directory events are
//! dropped here and never reach the consumer.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use tokio::sync::mpsc;
//! use tripwire_monitor::watcher::FileWatcher;
//! use tripwire_monitor::types::FileEvent;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     let watcher = FileWatcher::new(PathBuf::from("/srv/drop"), true, tx)?;
//!
//!     while let Some(event) = rx.recv().await {
//!         match event {
//!             FileEvent::Created { path } => println!("New file: {:?}", path),
//!             FileEvent::Moved { from, to } => println!("Moved: {:?} -> {:?}", from, to),
//!         }
//!     }
//!
//!     watcher.close();
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use notify::{
    event::{CreateKind, ModifyKind, RenameMode},
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::types::FileEvent;

/// Rename halves waiting for their partner before the map is reset.
const MAX_PENDING_RENAMES: usize = 256;

/// Errors that can occur during file watching operations.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialize the file system watcher.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// What currently sits at a path on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
    Missing,
}

impl PathKind {
    /// Inspects `path` on disk.
    #[must_use]
    pub fn probe(path: &Path) -> Self {
        match path.metadata() {
            Ok(meta) if meta.is_dir() => Self::Directory,
            Ok(_) => Self::File,
            Err(_) => Self::Missing,
        }
    }
}

/// Pending `From` halves of renames, keyed by tracker id.
#[derive(Debug, Default)]
pub struct RenameTracker {
    tracked: HashMap<usize, PathBuf>,
    untracked: Option<PathBuf>,
}

impl RenameTracker {
    fn remember(&mut self, tracker: Option<usize>, path: PathBuf) {
        match tracker {
            Some(id) => {
                // Files moved out of the tree never get a `To`; keep the map bounded.
                if self.tracked.len() >= MAX_PENDING_RENAMES {
                    debug!(pending = self.tracked.len(), "Dropping unmatched rename sources");
                    self.tracked.clear();
                }
                self.tracked.insert(id, path);
            }
            None => self.untracked = Some(path),
        }
    }

    fn take(&mut self, tracker: Option<usize>) -> Option<PathBuf> {
        match tracker {
            Some(id) => self.tracked.remove(&id),
            None => self.untracked.take(),
        }
    }

    /// Number of rename sources still waiting for a destination.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tracked.len() + usize::from(self.untracked.is_some())
    }
}

/// Translates one raw notify event into the file events it represents.
///
/// `probe` reports what is on disk at a path; it is injected so the
/// translation can be exercised without a real filesystem.
pub fn translate_event<F>(event: &Event, renames: &mut RenameTracker, probe: F) -> Vec<FileEvent>
where
    F: Fn(&Path) -> PathKind,
{
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(CreateKind::File) => event
            .paths
            .iter()
            .map(|path| FileEvent::Created { path: path.clone() })
            .collect(),
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter(|path| probe(path.as_path()) != PathKind::Directory)
            .map(|path| FileEvent::Created { path: path.clone() })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for path in &event.paths {
                renames.remember(event.tracker(), path.clone());
            }
            Vec::new()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            let mut events = Vec::new();
            for to in &event.paths {
                let from = renames.take(event.tracker());
                if probe(to.as_path()) == PathKind::Directory {
                    continue;
                }
                events.push(match from {
                    Some(from) => FileEvent::Moved {
                        from,
                        to: to.clone(),
                    },
                    None => FileEvent::Created { path: to.clone() },
                });
            }
            events
        }
        // Already reported when the `To` half arrived.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter(|path| probe(path.as_path()) == PathKind::File)
            .map(|path| FileEvent::Created { path: path.clone() })
            .collect(),
        _ => Vec::new(),
    }
}

/// Recursive subscription to create/rename events under a root directory.
///
/// Dropping the watcher releases the subscription; [`FileWatcher::close`] does
/// the same explicitly and logs completion.
#[derive(Debug)]
pub struct FileWatcher {
    /// Kept alive to maintain the subscription. `None` once released.
    watcher: Option<RecommendedWatcher>,

    /// The root directory being watched.
    root: PathBuf,
}

impl FileWatcher {
    /// Starts watching `root`, sending translated events to `event_sender`.
    ///
    /// The caller is expected to have checked that `root` is a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be initialized or refuses to
    /// watch `root`.
    pub fn new(
        root: PathBuf,
        recursive: bool,
        event_sender: mpsc::UnboundedSender<FileEvent>,
    ) -> Result<Self> {
        let mut renames = RenameTracker::default();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                handle_notify_event(res, &mut renames, &event_sender);
            },
            Config::default(),
        )?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&root, mode)?;

        info!(root = %root.display(), recursive, "Started file watch");

        Ok(Self {
            watcher: Some(watcher),
            root,
        })
    }

    /// Returns the directory being watched.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true while the subscription is held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    /// Releases the subscription.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.root) {
                debug!(root = %self.root.display(), error = %e, "Unwatch failed");
            }
            drop(watcher);
            info!(root = %self.root.display(), "Watcher stopped");
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.release();
    }
}

/// Handles a raw result from the notify backend.
fn handle_notify_event(
    res: std::result::Result<Event, notify::Error>,
    renames: &mut RenameTracker,
    event_sender: &mpsc::UnboundedSender<FileEvent>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "File watcher error");
            return;
        }
    };

    trace!(kind = ?event.kind, paths = ?event.paths, "Received notify event");

    for file_event in translate_event(&event, renames, PathKind::probe) {
        if event_sender.send(file_event).is_err() {
            debug!("Event receiver closed, dropping file event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn files_only(_: &Path) -> PathKind {
        PathKind::File
    }

    fn rename(mode: RenameMode, path: &str, tracker: Option<usize>) -> Event {
        let event =
            Event::new(EventKind::Modify(ModifyKind::Name(mode))).add_path(PathBuf::from(path));
        match tracker {
            Some(id) => event.set_tracker(id),
            None => event,
        }
    }

    #[test]
    fn test_create_file_is_forwarded() {
        let mut renames = RenameTracker::default();
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/w/report.EXE"));

        assert_eq!(
            translate_event(&event, &mut renames, files_only),
            vec![FileEvent::Created {
                path: PathBuf::from("/w/report.EXE")
            }]
        );
    }

    #[test]
    fn test_create_folder_is_discarded() {
        let mut renames = RenameTracker::default();
        let event =
            Event::new(EventKind::Create(CreateKind::Folder)).add_path(PathBuf::from("/w/x.exe"));
        assert!(translate_event(&event, &mut renames, files_only).is_empty());
    }

    #[test]
    fn test_create_any_checks_disk_for_directories() {
        let mut renames = RenameTracker::default();
        let event =
            Event::new(EventKind::Create(CreateKind::Any)).add_path(PathBuf::from("/w/dir.exe"));

        assert!(translate_event(&event, &mut renames, |_| PathKind::Directory).is_empty());
        assert_eq!(
            translate_event(&event, &mut renames, |_| PathKind::Missing).len(),
            1
        );
    }

    #[test]
    fn test_rename_pair_becomes_single_move() {
        let mut renames = RenameTracker::default();

        let from = rename(RenameMode::From, "/w/draft.txt", Some(7));
        assert!(translate_event(&from, &mut renames, files_only).is_empty());
        assert_eq!(renames.pending(), 1);

        let to = rename(RenameMode::To, "/w/payload.exe", Some(7));
        assert_eq!(
            translate_event(&to, &mut renames, files_only),
            vec![FileEvent::Moved {
                from: PathBuf::from("/w/draft.txt"),
                to: PathBuf::from("/w/payload.exe"),
            }]
        );
        assert_eq!(renames.pending(), 0);

        let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/w/draft.txt"))
            .add_path(PathBuf::from("/w/payload.exe"))
            .set_tracker(7);
        assert!(translate_event(&both, &mut renames, files_only).is_empty());
    }

    #[test]
    fn test_rename_pairs_by_tracker() {
        let mut renames = RenameTracker::default();
        translate_event(&rename(RenameMode::From, "/w/a", Some(1)), &mut renames, files_only);
        translate_event(&rename(RenameMode::From, "/w/b", Some(2)), &mut renames, files_only);

        let events = translate_event(
            &rename(RenameMode::To, "/w/b.exe", Some(2)),
            &mut renames,
            files_only,
        );
        assert_eq!(
            events,
            vec![FileEvent::Moved {
                from: PathBuf::from("/w/b"),
                to: PathBuf::from("/w/b.exe"),
            }]
        );
        assert_eq!(renames.pending(), 1);
    }

    #[test]
    fn test_untracked_rename_pairs_in_order() {
        let mut renames = RenameTracker::default();
        translate_event(&rename(RenameMode::From, "/w/old", None), &mut renames, files_only);
        let events =
            translate_event(&rename(RenameMode::To, "/w/new.bat", None), &mut renames, files_only);
        assert_eq!(
            events,
            vec![FileEvent::Moved {
                from: PathBuf::from("/w/old"),
                to: PathBuf::from("/w/new.bat"),
            }]
        );
    }

    #[test]
    fn test_move_in_from_outside_is_created() {
        let mut renames = RenameTracker::default();
        let events = translate_event(
            &rename(RenameMode::To, "/w/dropped.exe", Some(9)),
            &mut renames,
            files_only,
        );
        assert_eq!(
            events,
            vec![FileEvent::Created {
                path: PathBuf::from("/w/dropped.exe")
            }]
        );
    }

    #[test]
    fn test_directory_rename_is_discarded_and_clears_pending() {
        let mut renames = RenameTracker::default();
        translate_event(&rename(RenameMode::From, "/w/dir", Some(3)), &mut renames, files_only);
        let events = translate_event(
            &rename(RenameMode::To, "/w/dir.exe", Some(3)),
            &mut renames,
            |_| PathKind::Directory,
        );
        assert!(events.is_empty());
        assert_eq!(renames.pending(), 0);
    }

    #[test]
    fn test_ambiguous_rename_forwarded_only_when_file_exists() {
        let mut renames = RenameTracker::default();
        let event = rename(RenameMode::Any, "/w/x.exe", None);

        assert_eq!(translate_event(&event, &mut renames, files_only).len(), 1);
        assert!(translate_event(&event, &mut renames, |_| PathKind::Missing).is_empty());
    }

    #[test]
    fn test_modify_and_remove_ignored() {
        let mut renames = RenameTracker::default();
        let modify = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("/w/a"));
        let remove = Event::new(EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(PathBuf::from("/w/a"));
        assert!(translate_event(&modify, &mut renames, files_only).is_empty());
        assert!(translate_event(&remove, &mut renames, files_only).is_empty());
    }

    #[test]
    fn test_pending_renames_stay_bounded() {
        let mut renames = RenameTracker::default();
        for id in 0..(MAX_PENDING_RENAMES + 10) {
            renames.remember(Some(id), PathBuf::from(format!("/w/{id}")));
        }
        assert!(renames.pending() <= MAX_PENDING_RENAMES);
    }

    #[test]
    fn test_path_kind_probe() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.exe");
        fs::write(&file, b"x").unwrap();

        assert_eq!(PathKind::probe(dir.path()), PathKind::Directory);
        assert_eq!(PathKind::probe(&file), PathKind::File);
        assert_eq!(PathKind::probe(&dir.path().join("nope")), PathKind::Missing);
    }

    #[tokio::test]
    async fn test_file_watcher_missing_root_fails_to_watch() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = FileWatcher::new(PathBuf::from("/nonexistent/tripwire/path"), true, tx);

        assert!(matches!(result, Err(WatcherError::WatcherInit(_))));
    }

    #[tokio::test]
    async fn test_file_watcher_reports_created_file() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = FileWatcher::new(dir.path().to_path_buf(), true, tx).unwrap();
        assert_eq!(watcher.root(), dir.path());
        assert!(watcher.is_active());

        let target = dir.path().join("report.EXE");
        fs::write(&target, b"MZ").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Some(FileEvent::Created { path }) if path.ends_with("report.EXE") => {
                        break path
                    }
                    Some(_) => continue,
                    None => panic!("channel closed"),
                }
            }
        })
        .await
        .expect("no create event within timeout");

        assert!(event.ends_with("report.EXE"));
        watcher.close();
    }

    #[tokio::test]
    async fn test_close_releases_subscription() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = FileWatcher::new(dir.path().to_path_buf(), true, tx).unwrap();

        watcher.close();

        // The callback owned the only sender; releasing the backend closes the channel.
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
