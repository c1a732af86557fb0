//! Raw record extraction from a single store chunk.
//!
//! Legacy Cursor builds keep two flat JSON arrays per workspace store:
//! user prompts under `aiService.prompts` and AI generations under
//! `aiService.generations`. Each extractor reads one key, parses it, and
//! returns the elements as-is, with no reshaping here. A corrupt payload under
//! one key is logged and treated as empty; one bad record never blocks the
//! rest. Errors from the connection layer (missing store, missing table)
//! propagate unchanged so the caller can decide whether to skip the store.

use std::path::Path;

use rusqlite::Connection;
use serde_json::Value;

use crate::error::{StoreError, redacted_preview};
use crate::store::{self, KvTable};

/// ItemTable key holding the serialized prompt array.
pub const PROMPTS_KEY: &str = "aiService.prompts";

/// ItemTable key holding the serialized generation array.
pub const GENERATIONS_KEY: &str = "aiService.generations";

pub fn extract_prompts(conn: &Connection, path: &Path) -> Result<Vec<Value>, StoreError> {
    extract_array(conn, path, PROMPTS_KEY)
}

pub fn extract_generations(conn: &Connection, path: &Path) -> Result<Vec<Value>, StoreError> {
    extract_array(conn, path, GENERATIONS_KEY)
}

fn extract_array(conn: &Connection, path: &Path, key: &str) -> Result<Vec<Value>, StoreError> {
    let Some(raw) = store::kv_value(conn, path, KvTable::Items, key)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => {
            tracing::warn!(
                key,
                found = json_kind(&other),
                "expected a JSON array, treating as empty"
            );
            Ok(Vec::new())
        }
        Err(err) => {
            tracing::warn!(
                key,
                error = %err,
                value = %redacted_preview(key, &raw),
                "unparseable payload, treating as empty"
            );
            Ok(Vec::new())
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// What a raw record carries once the text-bearing fields are resolved.
///
/// Record shapes vary by message kind, so "which field holds the words" is
/// decided here once instead of null checks scattered through the
/// pipeline. Only [`TextPayload::Conversational`] ever reaches output;
/// thinking and tool-call records are recognized but never surfaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPayload {
    /// User or assistant conversational text.
    Conversational(String),
    /// Internal reasoning (`thinking.text`), never surfaced.
    Thinking,
    /// Tool invocation (`toolFormerData`), never surfaced.
    ToolCall,
    /// No usable text at all.
    Absent,
}

/// Resolve a record's text-bearing field in priority order: conversational
/// text first (`text`, then the generation-side `textDescription`), then
/// the recognized non-surfaceable shapes.
pub fn classify_text(record: &Value) -> TextPayload {
    for field in ["text", "textDescription"] {
        if let Some(text) = record.get(field).and_then(Value::as_str)
            && !text.trim().is_empty()
        {
            return TextPayload::Conversational(text.to_string());
        }
    }
    if record
        .pointer("/thinking/text")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.is_empty())
    {
        return TextPayload::Thinking;
    }
    if record.get("toolFormerData").is_some() {
        return TextPayload::ToolCall;
    }
    TextPayload::Absent
}
