//! AI-assisted boundary filtering.
//!
//! Given a candidate message list and a commit, ask a model where this
//! commit's work begins and trim everything before it. The model call is
//! a black box behind [`AiInvoker`]; its failure modes are ordinary
//! values, not exceptions. On any failure the default policy keeps the
//! whole candidate list: under-filtering is safer than silently losing a
//! developer's history.

use std::str::FromStr;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{DecisionParseError, InvokeError};
use crate::reconstruct::{ReconstructedMessage, Role};
use crate::telemetry;

/// Fixed delay before the single retry of a failed model call.
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Longest per-message excerpt included in the model context.
const CONTEXT_EXCERPT_CHARS: usize = 500;

/// Black-box model capability: prompt and context in, raw text out. The
/// implementation owns transport, authentication, and its own timeout.
pub trait AiInvoker {
    fn invoke(&self, prompt: &str, context: &str) -> Result<String, InvokeError>;
}

/// What to do when the model call fails or returns an unusable decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPolicy {
    /// Keep every candidate message (the default).
    #[default]
    Conservative,
    /// Return nothing; precision over recall.
    Aggressive,
}

impl FromStr for FilterPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(FilterPolicy::Conservative),
            "aggressive" => Ok(FilterPolicy::Aggressive),
            other => Err(format!("unknown filter policy `{other}`")),
        }
    }
}

/// Commit context handed in by the external git collaborator.
#[derive(Debug, Clone, Default)]
pub struct CommitContext {
    pub hash: String,
    pub message: String,
    pub changed_files: Vec<String>,
    /// The previous commit's journal entry, when the caller has one.
    pub previous_journal: Option<String>,
}

/// The model's verdict: the bubble where this commit's work begins.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundaryDecision {
    #[serde(rename = "bubbleId")]
    pub bubble_id: String,
    pub confidence: i64,
    pub reasoning: String,
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),
    #[error(transparent)]
    Parse(#[from] DecisionParseError),
}

/// A message with internal bookkeeping stripped, the shape handed to the
/// journal layer. Bubble id, timestamp, and composer id never leave the
/// pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamlinedMessage {
    pub role: Role,
    pub content: String,
    pub session_name: String,
}

impl From<&ReconstructedMessage> for StreamlinedMessage {
    fn from(message: &ReconstructedMessage) -> Self {
        StreamlinedMessage {
            role: message.role.clone(),
            content: message.content.clone(),
            session_name: message.session_name.clone(),
        }
    }
}

/// Trim `messages` to the ones belonging to `commit`.
///
/// An empty candidate list short-circuits without invoking the model. A
/// failed call, an unparseable response, or a bubble id outside the
/// candidate set resolves through `policy` instead of propagating.
pub fn filter_for_commit(
    messages: &[ReconstructedMessage],
    commit: &CommitContext,
    invoker: &dyn AiInvoker,
    policy: FilterPolicy,
) -> Vec<StreamlinedMessage> {
    if messages.is_empty() {
        return Vec::new();
    }

    let prompt = build_prompt(commit);
    let context = build_context(messages);
    let kept = match decide(invoker, &prompt, &context) {
        Ok(decision) => {
            match messages
                .iter()
                .position(|m| m.bubble_id == decision.bubble_id)
            {
                Some(boundary) => {
                    tracing::debug!(
                        bubble_id = %decision.bubble_id,
                        confidence = decision.confidence,
                        reasoning = %decision.reasoning,
                        "boundary accepted"
                    );
                    streamline(&messages[boundary..])
                }
                None => {
                    tracing::warn!(
                        bubble_id = %decision.bubble_id,
                        "boundary id not in candidate set, applying {policy:?} fallback"
                    );
                    fallback(messages, policy)
                }
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "boundary call failed, applying {policy:?} fallback");
            fallback(messages, policy)
        }
    };

    let before = messages.len();
    let after = kept.len();
    let reduction_pct = if before > 0 {
        ((before - after) as f64 / before as f64) * 100.0
    } else {
        0.0
    };
    tracing::info!(
        target: telemetry::TARGET,
        before,
        after,
        reduction_pct,
        "boundary filter"
    );
    kept
}

fn streamline(messages: &[ReconstructedMessage]) -> Vec<StreamlinedMessage> {
    messages.iter().map(StreamlinedMessage::from).collect()
}

fn fallback(messages: &[ReconstructedMessage], policy: FilterPolicy) -> Vec<StreamlinedMessage> {
    match policy {
        FilterPolicy::Conservative => streamline(messages),
        FilterPolicy::Aggressive => Vec::new(),
    }
}

/// One call, one retry after a fixed short delay.
fn decide(
    invoker: &dyn AiInvoker,
    prompt: &str,
    context: &str,
) -> Result<BoundaryDecision, FilterError> {
    match attempt(invoker, prompt, context) {
        Ok(decision) => Ok(decision),
        Err(first) => {
            tracing::debug!(error = %first, "boundary call failed, retrying once");
            thread::sleep(RETRY_DELAY);
            attempt(invoker, prompt, context)
        }
    }
}

fn attempt(
    invoker: &dyn AiInvoker,
    prompt: &str,
    context: &str,
) -> Result<BoundaryDecision, FilterError> {
    let raw = invoker.invoke(prompt, context)?;
    Ok(parse_decision(&raw)?)
}

/// Strict parse of the model response: a JSON object with exactly
/// `bubbleId` (non-empty string), `confidence` (integer 1–10) and
/// `reasoning` (non-empty string). Anything else is a parse error.
pub fn parse_decision(raw: &str) -> Result<BoundaryDecision, DecisionParseError> {
    let decision: BoundaryDecision = serde_json::from_str(strip_fences(raw))?;
    if decision.bubble_id.trim().is_empty() {
        return Err(DecisionParseError::Field("bubbleId"));
    }
    if !(1..=10).contains(&decision.confidence) {
        return Err(DecisionParseError::Field("confidence"));
    }
    if decision.reasoning.trim().is_empty() {
        return Err(DecisionParseError::Field("reasoning"));
    }
    Ok(decision)
}

/// Models love to wrap JSON in markdown fences; tolerate that one
/// transport quirk before the strict parse.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn build_prompt(commit: &CommitContext) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are deciding where a commit's work begins inside an IDE chat transcript.\n\
         The transcript below may span several commits. Identify the earliest message\n\
         that belongs to THIS commit's work and answer with a single JSON object:\n\
         {\"bubbleId\": \"<id of that message>\", \"confidence\": <integer 1-10>,\n  \"reasoning\": \"<one sentence>\"}\n\
         Answer with that object only.\n\n",
    );
    prompt.push_str(&format!("Commit {}\n", commit.hash));
    prompt.push_str(&format!("Message:\n{}\n", commit.message));
    if !commit.changed_files.is_empty() {
        prompt.push_str("Changed files:\n");
        for file in &commit.changed_files {
            prompt.push_str(&format!("  {file}\n"));
        }
    }
    if let Some(previous) = &commit.previous_journal {
        prompt.push_str("\nJournal entry for the previous commit (work before the boundary):\n");
        prompt.push_str(previous);
        prompt.push('\n');
    }
    prompt
}

fn build_context(messages: &[ReconstructedMessage]) -> String {
    let mut context = String::new();
    for message in messages {
        let excerpt: String = message.content.chars().take(CONTEXT_EXCERPT_CHARS).collect();
        context.push_str(&format!(
            "[{}] ({}) {}: {}\n",
            message.bubble_id, message.session_name, message.role, excerpt
        ));
    }
    context
}
