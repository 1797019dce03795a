pub mod config;
pub mod error;
pub mod types;

pub use config::LedgerChatConfig;
pub use error::{LedgerChatError, Result};
pub use types::*;
