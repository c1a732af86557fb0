//! Commit-based time window computation.
//!
//! The window brackets the work that produced a commit: from the first
//! parent's commit time up to the commit's own. Root commits get a
//! trailing 24 hours, merges get no window at all, and any failure to
//! read timestamps degrades to a trailing 24 hours from now, logged
//! rather than raised.

use serde::Serialize;

pub const HOUR_MS: i64 = 3_600_000;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Resolved commit timestamps, already in epoch milliseconds. Supplied by
/// an external git collaborator; this crate never shells out to git.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitTimes {
    pub commit_ms: i64,
    /// One entry per parent, in parent order. Empty for a root commit.
    pub parent_ms: Vec<i64>,
}

impl CommitTimes {
    /// Normalize from the second-granularity timestamps git reports.
    pub fn from_unix_seconds(commit_s: i64, parents_s: &[i64]) -> Self {
        CommitTimes {
            commit_ms: commit_s * 1_000,
            parent_ms: parents_s.iter().map(|s| s * 1_000).collect(),
        }
    }

    pub fn is_merge(&self) -> bool {
        self.parent_ms.len() > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStrategy {
    CommitBased,
    FirstCommit,
    #[serde(rename = "fallback_24h")]
    Fallback24h,
}

impl std::fmt::Display for WindowStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowStrategy::CommitBased => write!(f, "commit_based"),
            WindowStrategy::FirstCommit => write!(f, "first_commit"),
            WindowStrategy::Fallback24h => write!(f, "fallback_24h"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
    pub strategy: WindowStrategy,
    /// Derived from the bounds, never computed independently.
    pub duration_hours: f64,
}

impl TimeWindow {
    pub fn new(start_ms: i64, end_ms: i64, strategy: WindowStrategy) -> Self {
        TimeWindow {
            start_ms,
            end_ms,
            strategy,
            duration_hours: (end_ms - start_ms) as f64 / HOUR_MS as f64,
        }
    }

    pub fn contains(&self, ts_ms: i64) -> bool {
        self.start_ms <= ts_ms && ts_ms <= self.end_ms
    }

    /// Does `[start_ms, end_ms]` overlap this window at all?
    pub fn intersects(&self, start_ms: i64, end_ms: i64) -> bool {
        start_ms <= self.end_ms && end_ms >= self.start_ms
    }
}

/// Compute the window for a commit, or `None` for a merge commit so the
/// caller never attributes chat history to a merge.
pub fn window_for(
    times: Result<CommitTimes, eyre::Report>,
    now_ms: i64,
) -> Option<TimeWindow> {
    match times {
        Ok(times) if times.is_merge() => {
            tracing::debug!(parents = times.parent_ms.len(), "merge commit, no window");
            None
        }
        Ok(times) if times.parent_ms.len() == 1 => Some(TimeWindow::new(
            times.parent_ms[0],
            times.commit_ms,
            WindowStrategy::CommitBased,
        )),
        Ok(times) => Some(TimeWindow::new(
            times.commit_ms - DAY_MS,
            times.commit_ms,
            WindowStrategy::FirstCommit,
        )),
        Err(err) => {
            tracing::warn!(
                error = %err,
                "commit timestamps unavailable, falling back to trailing 24h"
            );
            Some(TimeWindow::new(
                now_ms - DAY_MS,
                now_ms,
                WindowStrategy::Fallback24h,
            ))
        }
    }
}
