//! Error types for the chat layer.

use crate::session::Phase;

/// Errors from the chat engine. Turn handling turns these into reply text;
/// none of them escape [`crate::ChatOrchestrator::handle_turn`].
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat is disabled")]
    Disabled,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("invalid phase transition: {0} -> {1}")]
    InvalidTransition(Phase, Phase),
    #[error("not signed in")]
    NotAuthenticated,
    #[error("directive rejected: {0}")]
    DirectiveRejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::Disabled.to_string(), "chat is disabled");
        assert_eq!(
            ChatError::EmptyMessage.to_string(),
            "message cannot be empty"
        );
        assert_eq!(
            ChatError::MessageTooLong(2000).to_string(),
            "message exceeds maximum length of 2000 characters"
        );
        assert_eq!(
            ChatError::InvalidTransition(Phase::Greeting, Phase::AuthPassword).to_string(),
            "invalid phase transition: GREETING -> AUTH_PASSWORD"
        );
        assert_eq!(ChatError::NotAuthenticated.to_string(), "not signed in");
        assert_eq!(
            ChatError::DirectiveRejected("method DELETE".into()).to_string(),
            "directive rejected: method DELETE"
        );
    }

    #[test]
    fn test_errors_implement_debug() {
        let dbg = format!("{:?}", ChatError::MessageTooLong(5));
        assert!(dbg.contains("MessageTooLong"));
    }
}
