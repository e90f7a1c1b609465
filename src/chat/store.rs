//! SQLite-backed persistence for the chat list.
//!
//! The whole ordered list is stored as one JSON record under a fixed key,
//! the way a browser's local storage would hold it. Every save rewrites
//! the record; there is no partial update.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;
use tracing::warn;

use super::types::ChatSession;

/// Storage key of the chat list record.
pub const CHATS_STORAGE_KEY: &str = "gemini_chats";

/// Errors raised by chat persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The stored record is not a valid chat list, or the list failed to encode.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A previous holder of the connection panicked.
    #[error("storage connection poisoned")]
    Poisoned,
}

/// Result type for chat persistence.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable storage for the ordered chat list.
pub trait ChatStore: Send + Sync {
    /// Load the stored list. A missing record is an empty list.
    ///
    /// # Errors
    /// Returns an error if storage access or decoding fails.
    fn load(&self) -> StoreResult<Vec<ChatSession>>;

    /// Replace the stored list.
    ///
    /// # Errors
    /// Returns an error if storage access or encoding fails.
    fn save(&self, chats: &[ChatSession]) -> StoreResult<()>;

    /// Copy a record that failed to load somewhere `save` will not touch.
    ///
    /// Called before the first save after a failed load. The default keeps
    /// nothing.
    ///
    /// # Errors
    /// Returns an error if the record could not be preserved.
    fn back_up_record(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// `SQLite` key/value implementation of [`ChatStore`].
pub struct SqliteChatStore {
    conn: Mutex<Connection>,
    table: String,
    key: String,
}

impl SqliteChatStore {
    /// Table holding the key/value records.
    pub const DEFAULT_TABLE: &'static str = "local_storage";

    /// Open (or create) the database file and its table.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be created.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        let table = Self::DEFAULT_TABLE.to_string();
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );"
        ))?;

        Ok(Self {
            conn: Mutex::new(conn),
            table,
            key: CHATS_STORAGE_KEY.to_string(),
        })
    }

    /// Key holding the copy of an unreadable record.
    #[must_use]
    pub fn backup_key(&self) -> String {
        format!("{}.unreadable", self.key)
    }

    /// Use a different record key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

impl ChatStore for SqliteChatStore {
    fn load(&self) -> StoreResult<Vec<ChatSession>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let raw: Option<String> = conn
            .query_row(
                &format!("SELECT value FROM {} WHERE key = ?1", self.table),
                [&self.key],
                |row| row.get(0),
            )
            .optional()?;
        drop(conn);

        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, chats: &[ChatSession]) -> StoreResult<()> {
        let json = serde_json::to_string(chats)?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            &format!(
                "INSERT INTO {} (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                self.table
            ),
            rusqlite::params![self.key, json],
        )?;
        Ok(())
    }

    fn back_up_record(&self) -> StoreResult<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let copied = conn.execute(
            &format!(
                "INSERT INTO {table} (key, value)
                 SELECT ?2, value FROM {table} WHERE key = ?1
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                table = self.table
            ),
            rusqlite::params![self.key, self.backup_key()],
        )?;
        if copied > 0 {
            warn!("Kept unreadable chat record under {}", self.backup_key());
        }
        Ok(())
    }
}
