//! Read-only connection and query layer over Cursor's SQLite stores.
//!
//! Connections are opened per call with `SQLITE_OPEN_READ_ONLY`; nothing
//! here ever writes. Native `rusqlite` failures are classified into the
//! [`StoreError`] taxonomy so callers can tell environment problems
//! (missing file, lock) apart from format drift (missing table) and from
//! our own statement bugs.

use std::path::Path;
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension, Row, ToSql};

use crate::error::{StoreError, truncate_sql};

/// Cursor holds write locks while it runs; give a busy store this long
/// before reporting it locked rather than stalling the pipeline.
const BUSY_TIMEOUT: Duration = Duration::from_millis(100);

/// The two key-value tables Cursor keeps per store. Identifiers cannot be
/// bound as parameters, so they come from this closed set only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvTable {
    /// `ItemTable`: arbitrary string keys to JSON blobs (session/composer
    /// metadata, legacy prompt and generation arrays).
    Items,
    /// `cursorDiskKV`: composite string keys to JSON blobs (per-bubble
    /// message records, per-session header lists).
    DiskKv,
}

impl KvTable {
    pub fn sql_name(self) -> &'static str {
        match self {
            KvTable::Items => "ItemTable",
            KvTable::DiskKv => "cursorDiskKV",
        }
    }
}

/// Open a store read-only.
///
/// A missing path is [`StoreError::NotFound`]; an unreadable or locked
/// file is [`StoreError::Access`]. A file that is not actually SQLite
/// opens lazily and surfaces as [`StoreError::Corrupt`] on first query.
pub fn open_store(path: &Path) -> Result<Connection, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound {
            path: path.to_path_buf(),
            operation: "open",
        });
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| classify(path, "open", "", 0, e))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| classify(path, "open", "PRAGMA busy_timeout", 0, e))?;
    conn.execute_batch("PRAGMA cache_size = -16384;")
        .map_err(|e| classify(path, "open", "PRAGMA cache_size", 0, e))?;
    Ok(conn)
}

/// Execute a parameterized statement and collect the mapped rows.
///
/// All SQL in this crate goes through bound placeholders; values are never
/// interpolated into statement text, so malformed input fails cleanly in
/// the driver instead of corrupting the query.
pub fn query_rows<T, F>(
    conn: &Connection,
    path: &Path,
    operation: &'static str,
    sql: &str,
    params: &[&dyn ToSql],
    mut map: F,
) -> Result<Vec<T>, StoreError>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| classify(path, operation, sql, params.len(), e))?;
    let mapped = stmt
        .query_map(params, |row| map(row))
        .map_err(|e| classify(path, operation, sql, params.len(), e))?;
    let mut rows = Vec::new();
    for item in mapped {
        rows.push(item.map_err(|e| classify(path, operation, sql, params.len(), e))?);
    }
    Ok(rows)
}

/// Fetch the JSON payload stored under `key`, or `None` if the key is
/// absent. Cursor writes values as either TEXT or BLOB depending on
/// version, so both storage classes are accepted.
pub fn kv_value(
    conn: &Connection,
    path: &Path,
    table: KvTable,
    key: &str,
) -> Result<Option<String>, StoreError> {
    let sql = format!("SELECT value FROM {} WHERE key = ?1", table.sql_name());
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| classify(path, "kv_value", &sql, 1, e))?;
    let value = stmt
        .query_row([key], |row| row.get::<_, SqlValue>(0))
        .optional()
        .map_err(|e| classify(path, "kv_value", &sql, 1, e))?;
    match value {
        None | Some(SqlValue::Null) => Ok(None),
        Some(SqlValue::Text(text)) => Ok(Some(text)),
        Some(SqlValue::Blob(bytes)) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Some(_) => Err(StoreError::Schema {
            path: path.to_path_buf(),
            operation: "kv_value",
            detail: format!("value under `{key}` has a non-text storage class"),
        }),
    }
}

/// Lightweight probe: does this store carry the named table?
pub fn has_table(conn: &Connection, path: &Path, table: &str) -> Result<bool, StoreError> {
    let rows = query_rows(
        conn,
        path,
        "has_table",
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
        &[&table],
        |row| row.get::<_, String>(0),
    )?;
    Ok(!rows.is_empty())
}

/// Map a native `rusqlite` failure onto the typed taxonomy.
fn classify(
    path: &Path,
    operation: &'static str,
    sql: &str,
    param_count: usize,
    err: rusqlite::Error,
) -> StoreError {
    let path = path.to_path_buf();
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            let detail = message.unwrap_or_else(|| code.to_string());
            let lowered = detail.to_lowercase();
            // "no such table/column" is format drift, not a statement bug.
            if lowered.contains("no such table") || lowered.contains("no such column") {
                return StoreError::Schema {
                    path,
                    operation,
                    detail,
                };
            }
            match code.code {
                ErrorCode::NotADatabase => StoreError::Corrupt {
                    path,
                    operation,
                    detail,
                },
                ErrorCode::CannotOpen
                | ErrorCode::PermissionDenied
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::ReadOnly => StoreError::Access {
                    path,
                    operation,
                    detail,
                },
                _ => StoreError::Query {
                    path,
                    operation,
                    detail,
                    statement: truncate_sql(sql),
                    param_count,
                },
            }
        }
        rusqlite::Error::InvalidParameterCount(got, expected) => StoreError::Query {
            path,
            operation,
            detail: format!("statement wants {expected} params, got {got}"),
            statement: truncate_sql(sql),
            param_count,
        },
        rusqlite::Error::InvalidColumnType(index, name, ty) => StoreError::Schema {
            path,
            operation,
            detail: format!("column `{name}` (index {index}) has unexpected type {ty}"),
        },
        rusqlite::Error::InvalidColumnName(name) => StoreError::Schema {
            path,
            operation,
            detail: format!("column `{name}` is absent"),
        },
        other => StoreError::Query {
            path,
            operation,
            detail: other.to_string(),
            statement: truncate_sql(sql),
            param_count,
        },
    }
}
