//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex and applies WAL mode plus
//! pending migrations when opened.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use ledgerchat_core::error::LedgerChatError;

use crate::migrations;

const PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA foreign_keys = ON;";

/// SQLite database shared by the storage repositories.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path, creating parent
    /// directories as needed.
    pub fn new(path: &Path) -> Result<Self, LedgerChatError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| LedgerChatError::Storage(format!("Failed to open database: {}", e)))?;

        info!("Database opened at {}", path.display());
        Self::init(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, LedgerChatError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            LedgerChatError::Storage(format!("Failed to open in-memory db: {}", e))
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, LedgerChatError> {
        conn.execute_batch(PRAGMAS)
            .map_err(|e| LedgerChatError::Storage(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run a closure against the connection while holding the lock.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, LedgerChatError>
    where
        F: FnOnce(&Connection) -> Result<T, LedgerChatError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LedgerChatError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv_rows(db: &Database) -> i64 {
        db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
                .map_err(|e| LedgerChatError::Storage(e.to_string()))
        })
        .unwrap()
    }

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        assert_eq!(kv_rows(&db), 0);
    }

    #[test]
    fn test_file_database_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledgerchat.db");
        let db = Database::new(&path).unwrap();
        assert_eq!(kv_rows(&db), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_wal_mode_enabled() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .map_err(|e| LedgerChatError::Storage(e.to_string()))?;
            // In-memory databases report "memory" instead of "wal".
            assert!(mode == "wal" || mode == "memory", "got: {}", mode);
            Ok(())
        })
        .unwrap();
    }
}
