//! Extension filtering for file events.
//!
//! A path is *monitored* when its lower-cased extension, including the leading
//! dot, is a member of the configured extension set. Extensions in the set are
//! expected to be normalized with [`normalize_extension`].
//!
//! # Example
//!
//! ```
//! use std::collections::HashSet;
//! use std::path::Path;
//! use tripwire_monitor::filter::is_monitored;
//!
//! let extensions: HashSet<String> = [".exe".to_string(), ".bat".to_string()].into();
//!
//! assert!(is_monitored(Path::new("/drop/report.EXE"), &extensions));
//! assert!(!is_monitored(Path::new("/drop/notes.txt"), &extensions));
//! ```

use std::collections::HashSet;
use std::path::Path;

/// Returns the lower-cased extension of `path` including its leading dot.
///
/// Paths without an extension (including dotfiles such as `.bashrc`) yield an
/// empty string. A trailing dot (`name.`) yields `"."`.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy().to_lowercase()),
        None => String::new(),
    }
}

/// Normalizes a configured extension: trims whitespace, lower-cases it and
/// ensures a leading dot.
///
/// Returns `None` for blank input.
#[must_use]
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lowered = trimmed.to_lowercase();
    if lowered.starts_with('.') {
        Some(lowered)
    } else {
        Some(format!(".{lowered}"))
    }
}

/// Decides whether `path` has one of the watched `extensions`.
#[must_use]
pub fn is_monitored(path: &Path, extensions: &HashSet<String>) -> bool {
    extensions.contains(&extension_of(path))
}
