//! Workspace validation with a TTL'd verdict cache.
//!
//! A candidate root is usable when it is a readable directory holding at
//! least one store chunk with the expected key-value schema. The probe is
//! an existence check plus a single `sqlite_master` lookup, never a full
//! scan, and it never mutates the store. I/O failures of any kind mean
//! "invalid", not an error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;

use crate::telemetry;
use crate::{discover, store};

/// Clock returning epoch milliseconds. Injectable so tests control cache
/// expiry deterministically.
pub type ClockMs = Box<dyn Fn() -> i64 + Send + Sync>;

struct CacheEntry {
    valid: bool,
    checked_at_ms: i64,
}

/// Validates candidate workspace roots, caching verdicts per path.
///
/// The cache is the only shared mutable state in the pipeline and is
/// guarded by a mutex, so a single validator can be shared across worker
/// threads.
pub struct WorkspaceValidator {
    cache: Mutex<HashMap<PathBuf, CacheEntry>>,
    ttl_ms: i64,
    clock: ClockMs,
}

impl WorkspaceValidator {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Box::new(|| Utc::now().timestamp_millis()))
    }

    pub fn with_clock(ttl: Duration, clock: ClockMs) -> Self {
        WorkspaceValidator {
            cache: Mutex::new(HashMap::new()),
            ttl_ms: ttl.as_millis() as i64,
            clock,
        }
    }

    /// Cached validity check.
    pub fn is_valid(&self, path: &Path) -> bool {
        self.check(path, false)
    }

    /// Validity check with an explicit cache bypass.
    pub fn check(&self, path: &Path, bypass_cache: bool) -> bool {
        let now = (self.clock)();
        if !bypass_cache {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = cache.get(path)
                && now - entry.checked_at_ms <= self.ttl_ms
            {
                tracing::debug!(
                    target: telemetry::TARGET,
                    cache = "hit",
                    path = %path.display(),
                    valid = entry.valid,
                    "workspace validity"
                );
                return entry.valid;
            }
        }
        let valid = probe(path);
        tracing::debug!(
            target: telemetry::TARGET,
            cache = "miss",
            path = %path.display(),
            valid,
            "workspace validity"
        );
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(
            path.to_path_buf(),
            CacheEntry {
                valid,
                checked_at_ms: now,
            },
        );
        valid
    }
}

fn probe(root: &Path) -> bool {
    if !root.is_dir() {
        return false;
    }
    let Some(store_path) = discover::first_store(root) else {
        return false;
    };
    let conn = match store::open_store(&store_path) {
        Ok(conn) => conn,
        Err(err) => {
            tracing::debug!(
                store = %store_path.display(),
                error = %err,
                "probe could not open store"
            );
            return false;
        }
    };
    store::has_table(&conn, &store_path, store::KvTable::Items.sql_name()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::fs;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};
    use tempfile::TempDir;

    fn workspace_with_store(schema: &str) -> TempDir {
        let root = TempDir::new().unwrap();
        let ws = root.path().join("abc123hash");
        fs::create_dir(&ws).unwrap();
        let conn = Connection::open(ws.join("state.vscdb")).unwrap();
        conn.execute_batch(schema).unwrap();
        root
    }

    fn ticking_validator(ttl_ms: i64) -> (WorkspaceValidator, Arc<AtomicI64>) {
        let now = Arc::new(AtomicI64::new(0));
        let handle = Arc::clone(&now);
        let validator = WorkspaceValidator::with_clock(
            Duration::from_millis(ttl_ms as u64),
            Box::new(move || handle.load(Ordering::SeqCst)),
        );
        (validator, now)
    }

    #[test]
    fn valid_workspace_passes() {
        let root = workspace_with_store("CREATE TABLE ItemTable (key TEXT PRIMARY KEY, value BLOB);");
        let validator = WorkspaceValidator::new(Duration::from_secs(30));
        assert!(validator.is_valid(root.path()));
    }

    #[test]
    fn wrong_schema_fails() {
        let root = workspace_with_store("CREATE TABLE unrelated (id INTEGER);");
        let validator = WorkspaceValidator::new(Duration::from_secs(30));
        assert!(!validator.is_valid(root.path()));
    }

    #[test]
    fn missing_dir_and_empty_dir_fail() {
        let validator = WorkspaceValidator::new(Duration::from_secs(30));
        assert!(!validator.is_valid(Path::new("/no/such/workspace")));
        let empty = TempDir::new().unwrap();
        assert!(!validator.is_valid(empty.path()));
    }

    #[test]
    fn verdict_is_cached_until_ttl_expires() {
        let root = workspace_with_store("CREATE TABLE ItemTable (key TEXT PRIMARY KEY, value BLOB);");
        let (validator, now) = ticking_validator(1_000);

        assert!(validator.is_valid(root.path()));

        // Invalidate the workspace on disk; the cached verdict should hold.
        fs::remove_dir_all(root.path().join("abc123hash")).unwrap();
        assert!(validator.is_valid(root.path()));

        // Past the TTL the re-check sees reality.
        now.store(2_000, Ordering::SeqCst);
        assert!(!validator.is_valid(root.path()));
    }

    #[test]
    fn bypass_flag_skips_the_cache() {
        let root = workspace_with_store("CREATE TABLE ItemTable (key TEXT PRIMARY KEY, value BLOB);");
        let (validator, _now) = ticking_validator(60_000);

        assert!(validator.check(root.path(), false));
        fs::remove_dir_all(root.path().join("abc123hash")).unwrap();
        assert!(validator.check(root.path(), false), "cached verdict");
        assert!(!validator.check(root.path(), true), "bypass re-probes");
    }
}
