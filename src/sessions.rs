//! Multi-session chat retrieval over every store chunk in a workspace.
//!
//! For each discovered store: read the composer index, keep the sessions
//! whose lifetime intersects the commit window, then materialize each
//! kept session's messages in header order. Stores predating the composer
//! index fall back to the flat prompt/generation arrays. Store chunks are
//! processed by a small worker pool; a single corrupt store is skipped,
//! never fatal. The merged result is re-sorted deterministically so
//! repeated runs over the same data produce byte-identical output.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{SendTimeoutError, bounded, unbounded};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;

use crate::config::RecallConfig;
use crate::error::{StoreError, redacted_preview};
use crate::extract::{self, TextPayload, classify_text};
use crate::reconstruct::{ReconstructedMessage, Role, reconstruct};
use crate::store::{self, KvTable};
use crate::telemetry;
use crate::window::TimeWindow;
use crate::discover;

/// ItemTable key holding the session (composer) index.
pub const COMPOSER_INDEX_KEY: &str = "composer.composerData";

/// Session name given to messages recovered from the legacy flat arrays,
/// which carry no composer metadata.
const LEGACY_SESSION_NAME: &str = "workspace history";

/// Immutable session snapshot from the composer index.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub composer_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub last_updated_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComposerIndex {
    #[serde(default)]
    all_composers: Vec<SessionMetadata>,
}

/// One entry of a session's ordered header list. `kind` is 1 for user
/// bubbles, 2 for assistant/tool bubbles.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    pub bubble_id: String,
    #[serde(rename = "type")]
    pub kind: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeaderIndex {
    #[serde(default)]
    full_conversation_headers_only: Vec<MessageHeader>,
}

pub struct SessionProvider<'a> {
    config: &'a RecallConfig,
}

impl<'a> SessionProvider<'a> {
    pub fn new(config: &'a RecallConfig) -> Self {
        SessionProvider { config }
    }

    /// Retrieve every message whose session intersects `window`, merged
    /// across all store chunks under `workspace_root` and deterministically
    /// ordered.
    pub fn get_messages(
        &self,
        workspace_root: &Path,
        window: &TimeWindow,
    ) -> Vec<ReconstructedMessage> {
        let all = discover::discover_all(workspace_root);
        let total = all.len();
        let stores = match self.config.recency_window_hours {
            Some(hours) => discover::filter_recent(all, hours),
            None => all,
        };
        tracing::info!(
            target: telemetry::TARGET,
            stores_found = total,
            stores_scanned = stores.len(),
            recency_filtered = total - stores.len(),
            "store discovery"
        );

        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let mut messages = fan_out(&stores, deadline, |path| {
            store_messages(path, window)
        });
        sort_deterministic(&mut messages);
        messages
    }
}

/// Merge order: timestamp ascending (absent timestamps first), then
/// composer id as the deterministic tie-break. Session timestamps are
/// coarse, so cross-session ties are common; the secondary key plus a
/// stable sort makes repeated runs byte-identical, which downstream
/// boundary filtering requires.
pub fn sort_deterministic(messages: &mut [ReconstructedMessage]) {
    messages.sort_by(|a, b| {
        a.timestamp_ms
            .cmp(&b.timestamp_ms)
            .then_with(|| a.composer_id.cmp(&b.composer_id))
    });
}

/// Fan store paths out across a bounded worker pool. Each worker opens
/// its own connections; store handles are never shared between threads.
/// Per-store failures are logged with their hint and skipped. Once the
/// deadline passes, workers stop picking up new stores and whatever has
/// been accumulated is returned.
fn fan_out<F>(stores: &[PathBuf], deadline: Option<Instant>, per_store: F) -> Vec<ReconstructedMessage>
where
    F: Fn(&Path) -> Result<Vec<ReconstructedMessage>, StoreError> + Sync,
{
    if stores.is_empty() {
        return Vec::new();
    }
    let n_workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .min(stores.len());

    let (tx, rx) = bounded::<PathBuf>(64);
    let (out_tx, out_rx) = unbounded::<Vec<ReconstructedMessage>>();

    thread::scope(|s| {
        for _ in 0..n_workers {
            let rx = rx.clone();
            let out_tx = out_tx.clone();
            let per_store = &per_store;

            s.spawn(move || {
                while let Ok(path) = rx.recv() {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        tracing::warn!(
                            store = %path.display(),
                            "deadline exceeded, returning accumulated messages"
                        );
                        break;
                    }
                    match per_store(&path) {
                        Ok(messages) => {
                            let _ = out_tx.send(messages);
                        }
                        Err(err) => {
                            // Skip this source, continue with the rest.
                            tracing::warn!(
                                store = %path.display(),
                                error = %err,
                                hint = err.hint(),
                                "skipping unusable store"
                            );
                        }
                    }
                }
            });
        }

        drop(rx);
        drop(out_tx);

        'feed: for path in stores {
            let mut pending = path.clone();
            loop {
                match tx.send_timeout(pending, Duration::from_millis(50)) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Disconnected(_)) => break 'feed,
                    Err(SendTimeoutError::Timeout(returned)) => {
                        pending = returned;
                        if deadline.is_some_and(|d| Instant::now() >= d) {
                            break 'feed;
                        }
                    }
                }
            }
        }
        drop(tx);
    });

    out_rx.try_iter().flatten().collect()
}

/// All in-window messages from one store chunk.
fn store_messages(
    path: &Path,
    window: &TimeWindow,
) -> Result<Vec<ReconstructedMessage>, StoreError> {
    let conn = store::open_store(path)?;
    match read_session_index(&conn, path)? {
        Some(sessions) => {
            let mut messages = Vec::new();
            let mut kept = 0usize;
            for session in &sessions {
                if !window.intersects(session.created_at, session.last_updated_at) {
                    continue;
                }
                kept += 1;
                // Connection-layer failures are per-session here: one
                // unreadable session must not sink the rest of the store.
                match session_messages(&conn, path, session) {
                    Ok(batch) => messages.extend(batch),
                    Err(err) => {
                        tracing::warn!(
                            store = %path.display(),
                            composer_id = %session.composer_id,
                            error = %err,
                            hint = err.hint(),
                            "skipping unreadable session"
                        );
                    }
                }
            }
            tracing::debug!(
                target: telemetry::TARGET,
                store = %path.display(),
                sessions_total = sessions.len(),
                sessions_kept = kept,
                messages = messages.len(),
                "store scanned"
            );
            Ok(messages)
        }
        None => legacy_messages(&conn, path, window),
    }
}

/// Read and parse the composer index, or `None` when the store predates
/// it (legacy layout). A present-but-unparseable index is logged and
/// treated as legacy rather than sinking the store.
fn read_session_index(
    conn: &Connection,
    path: &Path,
) -> Result<Option<Vec<SessionMetadata>>, StoreError> {
    let Some(raw) = store::kv_value(conn, path, KvTable::Items, COMPOSER_INDEX_KEY)? else {
        return Ok(None);
    };
    match serde_json::from_str::<ComposerIndex>(&raw) {
        Ok(index) => Ok(Some(index.all_composers)),
        Err(err) => {
            tracing::warn!(
                store = %path.display(),
                key = COMPOSER_INDEX_KEY,
                error = %err,
                value = %redacted_preview(COMPOSER_INDEX_KEY, &raw),
                "unparseable composer index, treating store as legacy"
            );
            Ok(None)
        }
    }
}

/// Materialize one session's messages in header order.
///
/// Only records with conversational text survive; thinking and tool-call
/// bubbles never produce content, which is exactly how they are excluded
/// from output. Messages inherit the session's creation time as their
/// sortable timestamp; the store keeps no finer per-message time.
fn session_messages(
    conn: &Connection,
    path: &Path,
    session: &SessionMetadata,
) -> Result<Vec<ReconstructedMessage>, StoreError> {
    let headers = read_headers(conn, path, &session.composer_id)?;
    let mut messages = Vec::with_capacity(headers.len());
    for header in &headers {
        let key = format!("bubbleId:{}:{}", session.composer_id, header.bubble_id);
        let Some(raw) = store::kv_value(conn, path, KvTable::DiskKv, &key)? else {
            continue;
        };
        let record: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(
                    key = %key,
                    error = %err,
                    "skipping malformed bubble record"
                );
                continue;
            }
        };
        let TextPayload::Conversational(content) = classify_text(&record) else {
            continue;
        };
        let role = match header.kind {
            1 => Role::User,
            2 => Role::Assistant,
            other => Role::Other(other.to_string()),
        };
        messages.push(ReconstructedMessage {
            role,
            content,
            timestamp_ms: Some(session.created_at),
            kind: None,
            session_name: session.name.clone(),
            composer_id: session.composer_id.clone(),
            bubble_id: header.bubble_id.clone(),
        });
    }
    Ok(messages)
}

fn read_headers(
    conn: &Connection,
    path: &Path,
    composer_id: &str,
) -> Result<Vec<MessageHeader>, StoreError> {
    let key = format!("composerData:{composer_id}");
    let Some(raw) = store::kv_value(conn, path, KvTable::DiskKv, &key)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<HeaderIndex>(&raw) {
        Ok(index) => Ok(index.full_conversation_headers_only),
        Err(err) => Err(StoreError::Parse {
            path: path.to_path_buf(),
            key,
            detail: err.to_string(),
        }),
    }
}

/// Legacy path for stores without a composer index: reconstruct the flat
/// prompt/generation arrays, keep timestamped messages inside the window
/// and timestamp-less ones unconditionally (prompts carry no time at all,
/// and dropping them would lose every user turn).
fn legacy_messages(
    conn: &Connection,
    path: &Path,
    window: &TimeWindow,
) -> Result<Vec<ReconstructedMessage>, StoreError> {
    let prompts = extract::extract_prompts(conn, path)?;
    let generations = extract::extract_generations(conn, path)?;
    let reconstruction = reconstruct(&prompts, &generations);
    if reconstruction.dropped() > 0 {
        tracing::debug!(
            store = %path.display(),
            dropped = reconstruction.dropped(),
            "legacy reconstruction dropped malformed records"
        );
    }

    // The tie-break key still needs to be meaningful here: use the
    // per-workspace directory name the chunk lives under.
    let store_label = path
        .parent()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "legacy".to_string());

    Ok(reconstruction
        .messages
        .into_iter()
        .filter(|message| match message.timestamp_ms {
            Some(ts) => window.contains(ts),
            None => true,
        })
        .map(|mut message| {
            message.session_name = LEGACY_SESSION_NAME.to_string();
            message.composer_id = store_label.clone();
            message
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::WindowStrategy;

    fn message(ts: Option<i64>, composer: &str, bubble: &str) -> ReconstructedMessage {
        ReconstructedMessage {
            role: Role::User,
            content: "x".into(),
            timestamp_ms: ts,
            kind: None,
            session_name: "s".into(),
            composer_id: composer.into(),
            bubble_id: bubble.into(),
        }
    }

    #[test]
    fn sort_breaks_timestamp_ties_by_composer_id() {
        let mut messages = vec![
            message(Some(200), "zeta", "z1"),
            message(Some(100), "beta", "b2"),
            message(Some(100), "alpha", "a1"),
            message(None, "omega", "o1"),
        ];
        sort_deterministic(&mut messages);
        let order: Vec<&str> = messages.iter().map(|m| m.bubble_id.as_str()).collect();
        assert_eq!(order, vec!["o1", "a1", "b2", "z1"]);
    }

    #[test]
    fn sort_is_stable_within_a_session() {
        // Same timestamp and composer: original (header) order must hold.
        let mut messages = vec![
            message(Some(100), "alpha", "first"),
            message(Some(100), "alpha", "second"),
            message(Some(100), "alpha", "third"),
        ];
        sort_deterministic(&mut messages);
        let order: Vec<&str> = messages.iter().map(|m| m.bubble_id.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn composer_index_parses_cursor_shape() {
        let raw = r#"{"allComposers":[
            {"composerId":"c-1","name":"fix auth","createdAt":1000,"lastUpdatedAt":2000},
            {"composerId":"c-2"}
        ]}"#;
        let index: ComposerIndex = serde_json::from_str(raw).unwrap();
        assert_eq!(index.all_composers.len(), 2);
        assert_eq!(index.all_composers[0].name, "fix auth");
        assert_eq!(index.all_composers[1].created_at, 0);
    }

    #[test]
    fn header_index_parses_cursor_shape() {
        let raw = r#"{"fullConversationHeadersOnly":[
            {"bubbleId":"b-1","type":1},
            {"bubbleId":"b-2","type":2}
        ]}"#;
        let index: HeaderIndex = serde_json::from_str(raw).unwrap();
        assert_eq!(index.full_conversation_headers_only.len(), 2);
        assert_eq!(index.full_conversation_headers_only[0].kind, 1);
    }

    #[test]
    fn fan_out_skips_failing_stores() {
        let stores = vec![
            PathBuf::from("/fixture/one"),
            PathBuf::from("/fixture/bad"),
            PathBuf::from("/fixture/two"),
        ];
        let collected = fan_out(&stores, None, |path| {
            if path.ends_with("bad") {
                Err(StoreError::NotFound {
                    path: path.to_path_buf(),
                    operation: "open",
                })
            } else {
                Ok(vec![message(Some(1), "c", path.to_str().unwrap())])
            }
        });
        assert_eq!(collected.len(), 2);
    }

    #[test]
    fn fan_out_deadline_returns_partial_results() {
        let stores: Vec<PathBuf> = (0..8).map(|i| PathBuf::from(format!("/s/{i}"))).collect();
        let deadline = Some(Instant::now() - Duration::from_millis(1));
        let collected = fan_out(&stores, deadline, |path| {
            Ok(vec![message(Some(1), "c", path.to_str().unwrap())])
        });
        // Already past the deadline: nothing new is picked up, and that is
        // a graceful empty result, not an error.
        assert!(collected.len() < stores.len());
    }

    #[test]
    fn window_used_for_session_membership() {
        let window = TimeWindow::new(1_000, 2_000, WindowStrategy::CommitBased);
        // created before the window but still open inside it
        assert!(window.intersects(500, 1_500));
        // entirely before
        assert!(!window.intersects(100, 900));
        // entirely after
        assert!(!window.intersects(2_100, 2_500));
    }
}
