//! LedgerChat storage crate: SQLite key-value persistence and the
//! interaction recall store built on top of it.

pub mod db;
pub mod kv;
pub mod migrations;
pub mod recall;

pub use db::Database;
pub use kv::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use recall::{Interaction, RecallStore, RECALL_KEY};
