//! Keyed expiring list store on SQLite.
//!
//! Redis-style lists: push newest-first, trim to a cap, expire whole keys.
//! Backs the per-user conversation history and the transient grouping of
//! album photos.

use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

pub struct ListStore {
    conn: Mutex<Connection>,
}

impl ListStore {
    /// Create an in-memory store (tests, or no data_dir configured).
    pub fn new() -> Self {
        let conn = Connection::open_in_memory().expect("Failed to create in-memory store");
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema();
        store
    }

    /// Open or create a store at the given path.
    pub fn with_path(path: &Path) -> Self {
        let conn = Connection::open(path).expect("Failed to open store");
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema();
        store
    }

    fn init_schema(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS lists (
                key TEXT NOT NULL,
                seq INTEGER NOT NULL,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS list_expiry (
                key TEXT PRIMARY KEY,
                expires_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_lists_key_seq ON lists(key, seq);
        "#,
        )
        .expect("Failed to initialize store schema");
    }

    /// Prepend a value to the list at `key`.
    pub fn push_front(&self, key: &str, value: &str) {
        let conn = self.conn.lock().unwrap();
        purge_if_expired(&conn, key);
        conn.execute(
            "INSERT INTO lists (key, seq, value)
             VALUES (?1, COALESCE((SELECT MIN(seq) FROM lists WHERE key = ?1), 1) - 1, ?2)",
            params![key, value],
        )
        .unwrap_or_else(|e| {
            warn!("Failed to push to list {key}: {e}");
            0
        });
    }

    /// Keep only the `max_len` newest entries.
    pub fn trim(&self, key: &str, max_len: usize) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM lists WHERE key = ?1 AND seq NOT IN
             (SELECT seq FROM lists WHERE key = ?1 ORDER BY seq ASC LIMIT ?2)",
            params![key, max_len as i64],
        )
        .unwrap_or_else(|e| {
            warn!("Failed to trim list {key}: {e}");
            0
        });
    }

    /// All entries at `key`, newest first. Empty if the key expired.
    pub fn range(&self, key: &str) -> Vec<String> {
        let conn = self.conn.lock().unwrap();
        purge_if_expired(&conn, key);
        let mut stmt = conn
            .prepare("SELECT value FROM lists WHERE key = ?1 ORDER BY seq ASC")
            .unwrap();
        stmt.query_map(params![key], |row| row.get::<_, String>(0))
            .map(|rows| rows.filter_map(Result::ok).collect())
            .unwrap_or_default()
    }

    /// Number of entries at `key`.
    pub fn len(&self, key: &str) -> usize {
        let conn = self.conn.lock().unwrap();
        purge_if_expired(&conn, key);
        conn.query_row(
            "SELECT COUNT(*) FROM lists WHERE key = ?1",
            params![key],
            |row| row.get::<_, i64>(0),
        )
        .unwrap_or(0) as usize
    }

    /// Reset the key's time-to-live, measured from now.
    pub fn expire(&self, key: &str, ttl: Duration) {
        let expires_at = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO list_expiry (key, expires_at) VALUES (?1, ?2)",
            params![key, expires_at],
        )
        .unwrap_or_else(|e| {
            warn!("Failed to set expiry on {key}: {e}");
            0
        });
    }

    /// Remove the list and its expiry record.
    pub fn delete(&self, key: &str) {
        let conn = self.conn.lock().unwrap();
        delete_key(&conn, key);
    }
}

impl Default for ListStore {
    fn default() -> Self {
        Self::new()
    }
}

fn purge_if_expired(conn: &Connection, key: &str) {
    let now = chrono::Utc::now().timestamp();
    let expired = conn
        .query_row(
            "SELECT expires_at FROM list_expiry WHERE key = ?1",
            params![key],
            |row| row.get::<_, i64>(0),
        )
        .map(|expires_at| expires_at <= now)
        .unwrap_or(false);
    if expired {
        delete_key(conn, key);
    }
}

fn delete_key(conn: &Connection, key: &str) {
    for sql in [
        "DELETE FROM lists WHERE key = ?1",
        "DELETE FROM list_expiry WHERE key = ?1",
    ] {
        conn.execute(sql, params![key]).unwrap_or_else(|e| {
            warn!("Failed to delete list {key}: {e}");
            0
        });
    }
}
