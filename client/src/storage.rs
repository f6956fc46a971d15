//! Persistent string-keyed store with JSON values, the terminal stand-in for
//! browser local storage.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage database: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to create storage directory: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    /// `None` for an absent or empty entry. Malformed JSON is an error.
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM items WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;

        match raw {
            Some(s) if !s.is_empty() => Ok(Some(serde_json::from_str(&s)?)),
            _ => Ok(None),
        }
    }

    pub fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO items (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, json],
        )?;
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM items WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.conn.execute("DELETE FROM items", [])?;
        Ok(())
    }

    /// Write a raw string, bypassing serialization. Only useful for seeding
    /// broken data in tests.
    #[cfg(test)]
    pub(crate) fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO items (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}
