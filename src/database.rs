use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

const APP_DIR: &str = "creatorflow";
const DB_FILE: &str = "creatorflow.db";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Lock error")]
    Lock,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not resolve the platform data directory")]
    NoDataDir,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Local SQLite database holding the key-value slots the app persists into
pub struct Database {
    pub conn: Mutex<Connection>,
}

impl Database {
    /// Open the database in the platform data directory, creating it on first run
    pub fn new() -> Result<Self, DbError> {
        let path = Self::default_path()?;
        Self::open(&path)
    }

    pub fn default_path() -> Result<PathBuf, DbError> {
        let dir = dirs::data_dir().ok_or(DbError::NoDataDir)?.join(APP_DIR);
        Ok(dir.join(DB_FILE))
    }

    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_kv_table()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.create_kv_table()?;
        Ok(db)
    }

    /// Create the key-value table
    pub fn create_kv_table(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let value = conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(value)
    }

    /// Insert or overwrite a slot
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;
        let now = chrono::Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value, now],
        )?;

        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<bool, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;
        let affected = conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
        Ok(affected > 0)
    }

    pub fn kv_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let mut stmt = conn.prepare(
            "SELECT key FROM kv_store WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let rows = stmt.query_map([prefix], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }

        Ok(keys)
    }
}
