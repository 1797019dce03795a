use thiserror::Error;

/// Top-level error type for LedgerChat.
///
/// Subsystem crates define their own error types for their collaborator
/// boundaries and convert into this one where a failure has to cross into
/// configuration or storage code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for LedgerChatError {
    fn from(err: toml::de::Error) -> Self {
        LedgerChatError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for LedgerChatError {
    fn from(err: toml::ser::Error) -> Self {
        LedgerChatError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerChatError {
    fn from(err: serde_json::Error) -> Self {
        LedgerChatError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for LedgerChat operations.
pub type Result<T> = std::result::Result<T, LedgerChatError>;
