//! End-to-end recall pipeline for a single commit.
//!
//! Window computation feeds session retrieval feeds limiting feeds the
//! boundary filter. Everything after workspace resolution degrades to
//! "as much data as could be recovered"; the only loud failure is having
//! no workspace at all and no override set.

use std::path::PathBuf;

use chrono::Utc;
use eyre::{Result, eyre};

use crate::boundary::{self, AiInvoker, CommitContext, StreamlinedMessage};
use crate::config::{ENV_WORKSPACE_DIR, RecallConfig};
use crate::limiter;
use crate::locate::{Platform, candidate_roots};
use crate::sessions::SessionProvider;
use crate::telemetry;
use crate::validate::WorkspaceValidator;
use crate::window::{CommitTimes, TimeWindow, window_for};

/// What a recall run produced. `window` is `None` exactly when the commit
/// was a merge and retrieval was skipped outright.
#[derive(Debug, Clone)]
pub struct RecallOutcome {
    pub messages: Vec<StreamlinedMessage>,
    pub window: Option<TimeWindow>,
}

/// Run the full pipeline for one commit.
///
/// `times` is the external git collaborator's answer for the commit's and
/// its parents' timestamps; passing its error through lets the window
/// calculator apply the 24-hour fallback instead of failing here.
pub fn recall_for_commit(
    config: &RecallConfig,
    times: Result<CommitTimes>,
    commit: &CommitContext,
    invoker: &dyn AiInvoker,
) -> Result<RecallOutcome> {
    let now_ms = Utc::now().timestamp_millis();
    let Some(window) = window_for(times, now_ms) else {
        tracing::info!(
            target: telemetry::TARGET,
            commit = %commit.hash,
            strategy = "skipped_merge",
            "merge commit, no chat attribution"
        );
        return Ok(RecallOutcome {
            messages: Vec::new(),
            window: None,
        });
    };
    tracing::info!(
        target: telemetry::TARGET,
        strategy = %window.strategy,
        duration_hours = window.duration_hours,
        "time window computed"
    );

    let workspace = resolve_workspace(config)?;
    let provider = SessionProvider::new(config);
    let history = provider.get_messages(&workspace, &window);

    let outcome = limiter::limit(
        history,
        config.max_user_messages,
        config.max_assistant_messages,
    );
    if let Some(truncation) = outcome.truncation {
        tracing::info!(
            target: telemetry::TARGET,
            user_removed = truncation.user_removed,
            assistant_removed = truncation.assistant_removed,
            "history truncated"
        );
    }

    let messages = boundary::filter_for_commit(
        &outcome.messages,
        commit,
        invoker,
        config.boundary_policy,
    );

    Ok(RecallOutcome {
        messages,
        window: Some(window),
    })
}

/// Resolve the workspace-storage directory to scan.
///
/// An explicit override bypasses discovery entirely. Otherwise candidate
/// roots are located per platform and validated; the first valid one
/// wins. This is the one place the pipeline fails loudly.
pub fn resolve_workspace(config: &RecallConfig) -> Result<PathBuf> {
    if let Some(path) = &config.workspace_override {
        return Ok(path.clone());
    }
    let platform = Platform::detect()?;
    let roots = candidate_roots(platform)?;
    let validator = WorkspaceValidator::new(config.validator_ttl);
    let valid: Vec<PathBuf> = roots
        .into_iter()
        .filter(|root| validator.is_valid(root))
        .collect();
    tracing::info!(
        target: telemetry::TARGET,
        workspace_count = valid.len(),
        "workspace discovery"
    );
    valid.into_iter().next().ok_or_else(|| {
        eyre!(
            "no Cursor workspace storage found; set {} to point at it explicitly",
            ENV_WORKSPACE_DIR
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_bypasses_discovery() {
        let config = RecallConfig {
            workspace_override: Some(PathBuf::from("/explicit/override")),
            ..RecallConfig::default()
        };
        // The path does not exist and would never validate; the override
        // must still win without touching discovery.
        assert_eq!(
            resolve_workspace(&config).unwrap(),
            PathBuf::from("/explicit/override")
        );
    }
}
