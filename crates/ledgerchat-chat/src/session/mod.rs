//! Per-conversation session state.
//!
//! A [`Session`] is owned by whoever drives the conversation and is passed
//! by `&mut` into each turn. It never touches ambient storage; use
//! [`SessionSnapshot`] to carry it across a process boundary.

pub mod login;
pub mod state_machine;

use std::collections::VecDeque;
use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use ledgerchat_core::types::TenantCandidate;
use ledgerchat_erp::{CallContext, ChatTurn};

use crate::error::ChatError;

pub use state_machine::{can_transition_to, validate_transition};

/// Where the conversation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Greeting,
    AuthEmail,
    AuthPassword,
    TenantSelection,
    Ready,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Greeting,
        Phase::AuthEmail,
        Phase::AuthPassword,
        Phase::TenantSelection,
        Phase::Ready,
    ];

    /// Phases in which input is answered by the sign-in dialogue instead of
    /// the intent resolver.
    pub fn is_auth_dialogue(&self) -> bool {
        matches!(
            self,
            Phase::AuthEmail | Phase::AuthPassword | Phase::TenantSelection
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Greeting => "GREETING",
            Phase::AuthEmail => "AUTH_EMAIL",
            Phase::AuthPassword => "AUTH_PASSWORD",
            Phase::TenantSelection => "TENANT_SELECTION",
            Phase::Ready => "READY",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scratch state of an in-progress sign-in dialogue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingLogin {
    pub email: Option<String>,
    /// Candidates on offer. Emptied when the dialogue leaves
    /// `TENANT_SELECTION`.
    pub tenants: Vec<TenantCandidate>,
    /// Company picked before a token was issued; authentication is then
    /// scoped to it.
    pub chosen: Option<TenantCandidate>,
}

pub struct Session {
    id: Uuid,
    phase: Phase,
    token: Option<SecretString>,
    token_epoch: u64,
    tenant_id: Option<String>,
    email: Option<String>,
    pending: Option<PendingLogin>,
    known_tenants: Vec<TenantCandidate>,
    transcript: VecDeque<ChatTurn>,
    transcript_limit: usize,
}

impl Session {
    pub fn new(transcript_limit: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: Phase::Greeting,
            token: None,
            token_epoch: 0,
            tenant_id: None,
            email: None,
            pending: None,
            known_tenants: Vec::new(),
            transcript: VecDeque::new(),
            transcript_limit,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// Bumped whenever a token is issued or dropped.
    pub fn token_epoch(&self) -> u64 {
        self.token_epoch
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn pending(&self) -> Option<&PendingLogin> {
        self.pending.as_ref()
    }

    pub(crate) fn pending_mut(&mut self) -> &mut PendingLogin {
        self.pending.get_or_insert_with(PendingLogin::default)
    }

    pub fn known_tenants(&self) -> &[TenantCandidate] {
        &self.known_tenants
    }

    /// Move to `to`, enforcing the transition table.
    ///
    /// Entering `READY` requires a token. Leaving `TENANT_SELECTION` drops
    /// the candidate list; reaching a resting phase drops the whole
    /// pending dialogue.
    pub fn transition_to(&mut self, to: Phase) -> Result<(), ChatError> {
        validate_transition(self.phase, to)?;
        if to == Phase::Ready && self.token.is_none() {
            return Err(ChatError::NotAuthenticated);
        }

        if self.phase == Phase::TenantSelection && to != Phase::TenantSelection {
            if let Some(pending) = self.pending.as_mut() {
                pending.tenants.clear();
            }
        }
        if matches!(to, Phase::Greeting | Phase::Ready) {
            self.pending = None;
        }

        if self.phase != to {
            debug!(session = %self.id, from = %self.phase, to = %to, "Phase transition");
        }
        self.phase = to;
        Ok(())
    }

    /// Phase to fall back to when a dialogue is abandoned.
    pub fn resting_phase(&self) -> Phase {
        if self.token.is_some() {
            Phase::Ready
        } else {
            Phase::Greeting
        }
    }

    pub(crate) fn set_token(&mut self, token: SecretString) {
        self.token = Some(token);
        self.token_epoch += 1;
    }

    pub(crate) fn clear_token(&mut self) {
        if self.token.take().is_some() {
            self.token_epoch += 1;
        }
    }

    /// Drop the token and return to `GREETING`. Tenant and company list are
    /// kept so signing back in can reuse them.
    pub fn sign_out(&mut self) {
        self.clear_token();
        self.pending = None;
        self.phase = Phase::Greeting;
    }

    pub(crate) fn set_tenant_id(&mut self, tenant_id: Option<String>) {
        self.tenant_id = tenant_id;
    }

    pub(crate) fn set_email(&mut self, email: Option<String>) {
        self.email = email;
    }

    pub(crate) fn set_known_tenants(&mut self, tenants: Vec<TenantCandidate>) {
        self.known_tenants = tenants;
    }

    /// Token and tenant as the transport should send them.
    pub fn call_context(&self) -> CallContext {
        CallContext::new(self.token.clone(), self.tenant_id.clone())
    }

    pub fn push_turn(&mut self, turn: ChatTurn) {
        self.transcript.push_back(turn);
        while self.transcript.len() > self.transcript_limit {
            self.transcript.pop_front();
        }
    }

    /// Recent messages, oldest first.
    pub fn transcript(&self) -> Vec<ChatTurn> {
        self.transcript.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            phase: self.phase,
            tenant_id: self.tenant_id.clone(),
            email: self.email.clone(),
            known_tenants: self.known_tenants.clone(),
            transcript: self.transcript(),
        }
    }

    /// Rebuild a session from a snapshot. Snapshots carry no token or
    /// dialogue scratch, so phases that depend on either restart at
    /// `GREETING`.
    pub fn restore(snapshot: SessionSnapshot, transcript_limit: usize) -> Self {
        let phase = match snapshot.phase {
            Phase::Ready | Phase::AuthPassword | Phase::TenantSelection => Phase::Greeting,
            other => other,
        };
        let mut session = Self {
            id: snapshot.id,
            phase,
            token: None,
            token_epoch: 0,
            tenant_id: snapshot.tenant_id,
            email: snapshot.email,
            pending: None,
            known_tenants: snapshot.known_tenants,
            transcript: VecDeque::new(),
            transcript_limit,
        };
        for turn in snapshot.transcript {
            session.push_turn(turn);
        }
        session
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("tenant_id", &self.tenant_id)
            .field("email", &self.email)
            .field("pending", &self.pending)
            .field("known_tenants", &self.known_tenants.len())
            .finish()
    }
}

/// Serializable view of a [`Session`] without the token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub phase: Phase,
    pub tenant_id: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub known_tenants: Vec<TenantCandidate>,
    #[serde(default)]
    pub transcript: Vec<ChatTurn>,
}
