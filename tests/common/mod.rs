//! Fixture builders shared by the integration tests.
//!
//! Builds miniature Cursor workspace-storage trees: per-workspace
//! directories each holding a `state.vscdb` with the two key-value tables
//! the crate reads. Test code writes the stores; the crate under test
//! only ever opens them read-only.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde_json::{Value, json};

/// One fixture store under `root/<dir_name>/state.vscdb`.
pub struct StoreBuilder {
    conn: Connection,
    composers: Vec<Value>,
    pub path: PathBuf,
}

impl StoreBuilder {
    pub fn new(root: &Path, dir_name: &str) -> Self {
        let dir = root.join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.vscdb");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE ItemTable (key TEXT PRIMARY KEY, value BLOB);
             CREATE TABLE cursorDiskKV (key TEXT PRIMARY KEY, value BLOB);",
        )
        .unwrap();
        StoreBuilder {
            conn,
            composers: Vec::new(),
            path,
        }
    }

    /// A store in the legacy layout: flat prompt/generation arrays and no
    /// composer index at all.
    pub fn legacy(root: &Path, dir_name: &str, prompts: &[Value], generations: &[Value]) -> Self {
        let builder = StoreBuilder::new(root, dir_name);
        builder.put_item("aiService.prompts", &Value::Array(prompts.to_vec()));
        builder.put_item("aiService.generations", &Value::Array(generations.to_vec()));
        builder
    }

    pub fn put_item(&self, key: &str, value: &Value) {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?1, ?2)",
                rusqlite::params![key, value.to_string()],
            )
            .unwrap();
    }

    pub fn put_kv(&self, key: &str, value: &Value) {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO cursorDiskKV (key, value) VALUES (?1, ?2)",
                rusqlite::params![key, value.to_string()],
            )
            .unwrap();
    }

    /// Add one session with the given bubbles. Each bubble is
    /// `(kind, record)` where kind 1 is a user turn and 2 an assistant
    /// turn; the record is the raw bubble JSON.
    pub fn add_session(
        &mut self,
        composer_id: &str,
        name: &str,
        created_at: i64,
        last_updated_at: i64,
        bubbles: &[(i64, Value)],
    ) {
        self.composers.push(json!({
            "composerId": composer_id,
            "name": name,
            "createdAt": created_at,
            "lastUpdatedAt": last_updated_at,
        }));

        let headers: Vec<Value> = bubbles
            .iter()
            .enumerate()
            .map(|(i, (kind, _))| {
                json!({"bubbleId": format!("{composer_id}-b{i}"), "type": kind})
            })
            .collect();
        self.put_kv(
            &format!("composerData:{composer_id}"),
            &json!({"fullConversationHeadersOnly": headers}),
        );
        for (i, (_, record)) in bubbles.iter().enumerate() {
            self.put_kv(&format!("bubbleId:{composer_id}:{composer_id}-b{i}"), record);
        }
    }

    /// Write the accumulated composer index. Call once per store after
    /// the last `add_session`.
    pub fn finish(&self) {
        self.put_item(
            "composer.composerData",
            &json!({"allComposers": self.composers}),
        );
    }
}

/// Shorthand for a plain-text bubble record.
pub fn text_bubble(text: &str) -> Value {
    json!({"text": text})
}
