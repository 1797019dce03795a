//! Conversation phase transitions.
//!
//! Sign-in dialogue: Greeting -> AuthEmail -> AuthPassword -> TenantSelection -> Ready
//! Ready -> TenantSelection (company switch)
//! Any dialogue phase -> Greeting/Ready (cancel, session expiry)

use crate::error::ChatError;
use crate::session::Phase;

/// Whether the session may move from `from` to `to`.
///
/// Staying in the same phase is always allowed.
pub fn can_transition_to(from: Phase, to: Phase) -> bool {
    from == to
        || matches!(
            (from, to),
            (Phase::Greeting, Phase::AuthEmail)
                | (Phase::Greeting, Phase::TenantSelection)
                | (Phase::Greeting, Phase::Ready)
                | (Phase::AuthEmail, Phase::AuthPassword)
                | (Phase::AuthEmail, Phase::Greeting)
                | (Phase::AuthEmail, Phase::Ready)
                | (Phase::AuthPassword, Phase::TenantSelection)
                | (Phase::AuthPassword, Phase::Ready)
                | (Phase::AuthPassword, Phase::Greeting)
                | (Phase::TenantSelection, Phase::Ready)
                | (Phase::TenantSelection, Phase::Greeting)
                | (Phase::TenantSelection, Phase::AuthPassword)
                | (Phase::Ready, Phase::AuthEmail)
                | (Phase::Ready, Phase::TenantSelection)
                | (Phase::Ready, Phase::Greeting)
        )
}

/// Validate that a phase transition is allowed.
pub fn validate_transition(from: Phase, to: Phase) -> Result<(), ChatError> {
    if can_transition_to(from, to) {
        Ok(())
    } else {
        Err(ChatError::InvalidTransition(from, to))
    }
}
