//! Multi-store discovery under a workspace-storage root.
//!
//! A workspace's conversation data rotates into a fresh `state.vscdb`
//! chunk after a fixed number of generation records (observed: 100), so a
//! single root can hold many store files spread across per-workspace
//! directories. The walk tolerates unreadable directories by skipping
//! them; a permission problem in one corner must never abort discovery.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Filename of every Cursor store chunk.
pub const STORE_FILE_NAME: &str = "state.vscdb";

/// Default recency window for [`filter_recent`], in hours. Tuned against
/// the observed rotation cadence; a tunable heuristic, not an invariant.
pub const DEFAULT_RECENCY_WINDOW_HOURS: f64 = 48.0;

/// Recursively collect every store chunk under `root`, sorted for a
/// deterministic order regardless of directory-listing order.
pub fn discover_all(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    walk(root, &mut found);
    found.sort();
    found
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!(dir = %dir.display(), error = %err, "skipping unreadable directory");
            return;
        }
    };
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            walk(&entry.path(), found);
        } else if file_type.is_file() && entry.file_name() == STORE_FILE_NAME {
            found.push(entry.path());
        }
    }
}

/// Depth-first search for any single store chunk, used by the workspace
/// validator's existence probe. Stops at the first hit instead of walking
/// the whole tree.
pub fn first_store(root: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(root).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        match entry.file_type() {
            Ok(t) if t.is_file() && entry.file_name() == STORE_FILE_NAME => {
                return Some(entry.path());
            }
            Ok(t) if t.is_dir() => subdirs.push(entry.path()),
            _ => {}
        }
    }
    subdirs.into_iter().find_map(|dir| first_store(&dir))
}

/// Drop stores whose modification time falls outside the trailing window.
///
/// Purely a performance optimization for workspaces with years of chunked
/// history; correctness never depends on it. Session membership is decided
/// by creation-time intersection in the provider, which can always run
/// over the full [`discover_all`] result. Paths that fail to stat are
/// dropped, not retried.
pub fn filter_recent(paths: Vec<PathBuf>, window_hours: f64) -> Vec<PathBuf> {
    let window = Duration::from_secs_f64((window_hours * 3600.0).max(0.0));
    let cutoff = SystemTime::now().checked_sub(window);
    paths
        .into_iter()
        .filter(|path| match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(mtime) => cutoff.is_none_or(|cutoff| mtime >= cutoff),
            Err(err) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %err,
                    "dropping store with unreadable mtime"
                );
                false
            }
        })
        .collect()
}
