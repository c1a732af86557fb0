//! Error taxonomy for store access and the surrounding pipeline.
//!
//! The store-facing variants map directly onto what can go wrong when
//! reading another application's SQLite files: the file is missing
//! (`NotFound`), unreadable or locked (`Access`), present but laid out
//! differently than expected (`Schema`, the signal that Cursor changed
//! its storage format), damaged (`Corrupt`), or our own statement is
//! wrong (`Query`). `Parse` covers JSON payloads that load fine from
//! SQLite but do not decode.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Longest statement fragment carried inside a [`StoreError::Query`].
const SQL_CONTEXT_LIMIT: usize = 120;

/// Typed failure from the connection/query layer.
///
/// Every variant carries the store path and the operation that was in
/// flight, so a caller several layers up can log something actionable
/// without re-deriving context.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store not found at {path} during {operation}")]
    NotFound { path: PathBuf, operation: &'static str },

    #[error("store at {path} is unreadable or locked during {operation}: {detail}")]
    Access {
        path: PathBuf,
        operation: &'static str,
        detail: String,
    },

    #[error("store at {path} is missing an expected table or column: {detail}")]
    Schema {
        path: PathBuf,
        operation: &'static str,
        detail: String,
    },

    #[error(
        "query failed against {path}: {detail} (statement `{statement}`, {param_count} params)"
    )]
    Query {
        path: PathBuf,
        operation: &'static str,
        detail: String,
        statement: String,
        param_count: usize,
    },

    #[error("store at {path} could not be read as a database: {detail}")]
    Corrupt {
        path: PathBuf,
        operation: &'static str,
        detail: String,
    },

    #[error("malformed payload under key `{key}` in {path}: {detail}")]
    Parse {
        path: PathBuf,
        key: String,
        detail: String,
    },
}

impl StoreError {
    /// A troubleshooting hint derived from the error kind, suitable for
    /// surfacing to a user alongside the error itself.
    pub fn hint(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => {
                "verify Cursor has been run on this machine and the workspace path is correct"
            }
            StoreError::Access { .. } => {
                "close Cursor or copy the store file elsewhere before reading; check permissions"
            }
            StoreError::Schema { .. } => {
                "Cursor's storage layout may have changed in an update; try a newer cursor-recall"
            }
            StoreError::Query { .. } => {
                "this is a statement bug, not an environment problem; please report it"
            }
            StoreError::Corrupt { .. } => {
                "the store file appears damaged; Cursor may rewrite it on its next launch"
            }
            StoreError::Parse { .. } => "the record under this key is malformed and will be skipped",
        }
    }

    /// The store path this error is about.
    pub fn path(&self) -> &std::path::Path {
        match self {
            StoreError::NotFound { path, .. }
            | StoreError::Access { path, .. }
            | StoreError::Schema { path, .. }
            | StoreError::Query { path, .. }
            | StoreError::Corrupt { path, .. }
            | StoreError::Parse { path, .. } => path,
        }
    }
}

/// Failure to resolve platform-specific workspace roots.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("platform `{0}` is not supported for workspace discovery")]
    UnsupportedPlatform(String),

    #[error("no per-user configuration directory could be resolved")]
    NoConfigDir,
}

/// Failure of the black-box model invocation behind the boundary filter.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("model invocation failed: {0}")]
    Transport(String),

    #[error("model invocation timed out after {0:?}")]
    Timeout(Duration),
}

/// Strict-parse failure of a boundary decision returned by the model.
#[derive(Debug, Error)]
pub enum DecisionParseError {
    #[error("decision is not the expected JSON object: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("decision field `{0}` is missing, mistyped, or out of range")]
    Field(&'static str),
}

/// Truncate a statement for inclusion in error context.
pub(crate) fn truncate_sql(sql: &str) -> String {
    let trimmed = sql.trim();
    if trimmed.len() <= SQL_CONTEXT_LIMIT {
        trimmed.to_string()
    } else {
        let mut cut = SQL_CONTEXT_LIMIT;
        while !trimmed.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &trimmed[..cut])
    }
}

/// Whether a context field name looks like it could hold a credential.
fn secret_like(key: &str) -> bool {
    let lowered = key.to_lowercase();
    ["token", "secret", "password", "credential", "apikey", "api_key", "auth"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

/// A loggable preview of a context value: redacted outright when the field
/// name looks credential-shaped, truncated otherwise.
pub fn redacted_preview(key: &str, value: &str) -> String {
    if secret_like(key) {
        return "[redacted]".to_string();
    }
    let mut preview: String = value.chars().take(80).collect();
    if preview.len() < value.len() {
        preview.push('…');
    }
    preview
}
