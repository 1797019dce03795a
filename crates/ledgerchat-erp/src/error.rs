use thiserror::Error;

/// Failures reported by ERP collaborators.
#[derive(Debug, Error)]
pub enum ErpError {
    /// The request never produced an HTTP response.
    #[error("Connectivity error: {0}")]
    Transport(String),

    /// The backend answered with `success = false`.
    #[error("{0}")]
    Api(String),

    /// The backend rejected the session credentials (401/403).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The backend answered, but not in the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Responder error: {0}")]
    Responder(String),
}

impl From<reqwest::Error> for ErpError {
    fn from(err: reqwest::Error) -> Self {
        ErpError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ErpError {
    fn from(err: serde_json::Error) -> Self {
        ErpError::Decode(err.to_string())
    }
}
