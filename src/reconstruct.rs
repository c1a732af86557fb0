//! Reconstruction of extracted records into a uniform message shape.
//!
//! Prompts and generations are kept in their stored order and are never
//! paired up: all valid prompts come first, then all valid generations.
//! Cursor does not persist enough to interleave them reliably, so
//! downstream consumers infer conversational flow from content, not
//! position.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::{TextPayload, classify_text};

/// Message author role. Older store versions carried roles this crate
/// does not know about; those round-trip as [`Role::Other`] instead of
/// being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[serde(untagged)]
    Other(String),
}

impl Role {
    pub fn is_user(&self) -> bool {
        matches!(self, Role::User)
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Role::Assistant)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Other(role) => write!(f, "{role}"),
        }
    }
}

/// One chat message in the uniform shape the rest of the pipeline works
/// with. `content` is never empty once a message exists; records without
/// usable text are never materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconstructedMessage {
    pub role: Role,
    pub content: String,
    /// Server-side epoch millis; `None` for prompts, which carry none.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: Option<i64>,
    /// The generation record's `type` field, when present.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub session_name: String,
    pub composer_id: String,
    pub bubble_id: String,
}

/// Result of one reconstruction pass. The counts report the *original*
/// input sizes, not the post-filter sizes, so callers can tell how much
/// was dropped as malformed.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub messages: Vec<ReconstructedMessage>,
    pub prompt_count: usize,
    pub generation_count: usize,
}

impl Reconstruction {
    pub fn dropped(&self) -> usize {
        (self.prompt_count + self.generation_count).saturating_sub(self.messages.len())
    }
}

/// Merge extracted prompt and generation records into messages.
///
/// Every prompt with usable text becomes one `user` message with no
/// timestamp or type. Every generation with usable text becomes one
/// `assistant` message carrying the record's `unixMs` and `type`.
/// Malformed records are skipped with a warning.
pub fn reconstruct(prompts: &[Value], generations: &[Value]) -> Reconstruction {
    let mut messages = Vec::with_capacity(prompts.len() + generations.len());

    for (index, prompt) in prompts.iter().enumerate() {
        match classify_text(prompt) {
            TextPayload::Conversational(content) => messages.push(ReconstructedMessage {
                role: Role::User,
                content,
                timestamp_ms: None,
                kind: None,
                session_name: String::new(),
                composer_id: String::new(),
                bubble_id: String::new(),
            }),
            _ => {
                tracing::warn!(index, "prompt record without usable text, skipping");
            }
        }
    }

    for (index, generation) in generations.iter().enumerate() {
        match classify_text(generation) {
            TextPayload::Conversational(content) => messages.push(ReconstructedMessage {
                role: Role::Assistant,
                content,
                timestamp_ms: generation.get("unixMs").and_then(Value::as_i64),
                kind: generation
                    .get("type")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                session_name: String::new(),
                composer_id: String::new(),
                bubble_id: generation
                    .get("generationUUID")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            _ => {
                tracing::warn!(index, "generation record without usable text, skipping");
            }
        }
    }

    Reconstruction {
        messages,
        prompt_count: prompts.len(),
        generation_count: generations.len(),
    }
}
