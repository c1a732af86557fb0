//! Per-role message-count limiting.
//!
//! Caps user and assistant counts independently, keeping the most recent
//! N of each role while preserving the overall interleaving of whatever
//! survives. Messages with a role this crate does not recognize pass
//! through unfiltered for compatibility with older store data.

use crate::reconstruct::{ReconstructedMessage, Role};

pub const DEFAULT_MAX_USER: usize = 200;
pub const DEFAULT_MAX_ASSISTANT: usize = 200;

/// How much each role lost to the caps. Only produced when something was
/// actually removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncation {
    pub user_removed: usize,
    pub assistant_removed: usize,
}

#[derive(Debug, Clone)]
pub struct LimitOutcome {
    pub messages: Vec<ReconstructedMessage>,
    pub truncation: Option<Truncation>,
}

/// Cap the history at `max_user` user and `max_assistant` assistant
/// messages, dropping the oldest of each role first.
pub fn limit(
    history: Vec<ReconstructedMessage>,
    max_user: usize,
    max_assistant: usize,
) -> LimitOutcome {
    let total_user = history.iter().filter(|m| m.role.is_user()).count();
    let total_assistant = history.iter().filter(|m| m.role.is_assistant()).count();

    if total_user <= max_user && total_assistant <= max_assistant {
        return LimitOutcome {
            messages: history,
            truncation: None,
        };
    }

    let skip_user = total_user.saturating_sub(max_user);
    let skip_assistant = total_assistant.saturating_sub(max_assistant);
    let mut seen_user = 0usize;
    let mut seen_assistant = 0usize;
    let messages = history
        .into_iter()
        .filter(|message| match message.role {
            Role::User => {
                seen_user += 1;
                seen_user > skip_user
            }
            Role::Assistant => {
                seen_assistant += 1;
                seen_assistant > skip_assistant
            }
            Role::Other(_) => true,
        })
        .collect();

    LimitOutcome {
        messages,
        truncation: Some(Truncation {
            user_removed: skip_user,
            assistant_removed: skip_assistant,
        }),
    }
}
