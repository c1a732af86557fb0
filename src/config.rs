use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::boundary::FilterPolicy;

/// Environment variable holding an explicit workspace-storage path.
/// When set, auto-discovery is bypassed entirely.
pub const ENV_WORKSPACE_DIR: &str = "CURSOR_RECALL_WORKSPACE_DIR";

/// Environment variable selecting the boundary-filter failure policy
/// (`conservative` keeps everything on failure, `aggressive` keeps nothing).
pub const ENV_BOUNDARY_POLICY: &str = "CURSOR_RECALL_BOUNDARY_POLICY";

/// Configuration threaded through the pipeline's entry point.
///
/// Components never read process environment themselves; everything
/// environment-derived is resolved once here and passed down, which keeps
/// the pipeline testable without process-global mutation.
#[derive(Debug, Clone)]
pub struct RecallConfig {
    /// Explicit workspace-storage directory; bypasses platform discovery.
    pub workspace_override: Option<PathBuf>,
    /// What to do when the AI boundary call fails or returns garbage.
    pub boundary_policy: FilterPolicy,
    /// Per-role caps applied before the boundary filter.
    pub max_user_messages: usize,
    pub max_assistant_messages: usize,
    /// Store files whose mtime is older than this many hours are skipped.
    /// `None` disables the heuristic and scans every chunk. This is a
    /// performance tunable; session membership is still decided by
    /// creation time, never by file mtime.
    pub recency_window_hours: Option<f64>,
    /// How long a workspace validity verdict stays cached.
    pub validator_ttl: Duration,
    /// Overall retrieval deadline; on expiry the provider returns whatever
    /// it has accumulated instead of raising.
    pub deadline: Option<Duration>,
}

impl Default for RecallConfig {
    fn default() -> Self {
        RecallConfig {
            workspace_override: None,
            boundary_policy: FilterPolicy::default(),
            max_user_messages: crate::limiter::DEFAULT_MAX_USER,
            max_assistant_messages: crate::limiter::DEFAULT_MAX_ASSISTANT,
            recency_window_hours: Some(crate::discover::DEFAULT_RECENCY_WINDOW_HOURS),
            validator_ttl: Duration::from_secs(30),
            deadline: None,
        }
    }
}

impl RecallConfig {
    /// Build a config from the process environment.
    ///
    /// An unrecognized policy value is logged and falls back to the
    /// conservative default rather than failing startup.
    pub fn from_env() -> Self {
        let mut config = RecallConfig::default();
        if let Ok(dir) = env::var(ENV_WORKSPACE_DIR)
            && !dir.trim().is_empty()
        {
            config.workspace_override = Some(PathBuf::from(dir));
        }
        if let Ok(raw) = env::var(ENV_BOUNDARY_POLICY) {
            match raw.parse::<FilterPolicy>() {
                Ok(policy) => config.boundary_policy = policy,
                Err(_) => {
                    tracing::warn!(
                        value = %raw,
                        "unrecognized {} value, keeping conservative policy",
                        ENV_BOUNDARY_POLICY
                    );
                }
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let config = RecallConfig::default();
        assert_eq!(config.boundary_policy, FilterPolicy::Conservative);
        assert_eq!(config.max_user_messages, 200);
        assert_eq!(config.max_assistant_messages, 200);
        assert_eq!(config.recency_window_hours, Some(48.0));
        assert!(config.workspace_override.is_none());
        assert!(config.deadline.is_none());
    }
}
