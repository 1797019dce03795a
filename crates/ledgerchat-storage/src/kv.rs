//! String key-value persistence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::OptionalExtension;

use ledgerchat_core::error::LedgerChatError;
use ledgerchat_core::types::Timestamp;

use crate::db::Database;

/// Durable string store keyed by name.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, LedgerChatError>;
    fn set(&self, key: &str, value: &str) -> Result<(), LedgerChatError>;
}

/// [`KeyValueStore`] backed by the `kv_store` table.
pub struct SqliteKeyValueStore {
    db: Arc<Database>,
}

impl SqliteKeyValueStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, LedgerChatError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| LedgerChatError::Storage(format!("Failed to read key {}: {}", key, e)))
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LedgerChatError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                rusqlite::params![key, value, Timestamp::now().0],
            )
            .map_err(|e| LedgerChatError::Storage(format!("Failed to write key {}: {}", key, e)))?;
            Ok(())
        })
    }
}

/// In-process [`KeyValueStore`], used by tests and when recall is disabled
/// on disk.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, LedgerChatError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| LedgerChatError::Storage(format!("Store lock poisoned: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LedgerChatError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| LedgerChatError::Storage(format!("Store lock poisoned: {}", e)))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
