//! Chat orchestrator: the per-turn driver.
//!
//! validate -> sync backend context -> sign-in dialogue or resolve, record
//! and dispatch -> detect an expired token -> sync context -> reply.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use ledgerchat_core::config::ChatConfig;
use ledgerchat_erp::{ChatTurn, ErpBackend, Responder};
use ledgerchat_intent::{resolve_at, Intent};
use ledgerchat_storage::RecallStore;

use crate::dispatcher::Dispatcher;
use crate::error::ChatError;
use crate::response::Reply;
use crate::session::{login, Phase, Session};

pub const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";
pub const TURN_FAILED: &str = "Sorry, I encountered an error. Please try again.";

pub struct ChatOrchestrator {
    config: ChatConfig,
    backend: Arc<dyn ErpBackend>,
    dispatcher: Dispatcher,
    recall: Option<RecallStore>,
}

impl ChatOrchestrator {
    pub fn new(
        config: ChatConfig,
        backend: Arc<dyn ErpBackend>,
        document_base_url: impl Into<String>,
    ) -> Self {
        let dispatcher = Dispatcher::new(backend.clone(), document_base_url);
        Self {
            config,
            backend,
            dispatcher,
            recall: None,
        }
    }

    /// Answer unrecognised turns with a free-form responder.
    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.dispatcher = self.dispatcher.with_responder(responder);
        self
    }

    /// Record resolved turns for suggestions.
    pub fn with_recall(mut self, recall: RecallStore) -> Self {
        self.recall = Some(recall);
        self
    }

    pub fn new_session(&self) -> Session {
        Session::new(self.config.transcript_turns)
    }

    /// Check a message before anything else looks at it.
    pub fn validate(&self, message: &str) -> Result<(), ChatError> {
        if !self.config.enabled {
            return Err(ChatError::Disabled);
        }
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }
        Ok(())
    }

    pub async fn handle_turn(&self, session: &mut Session, input: &str) -> Reply {
        self.handle_turn_at(session, input, Utc::now()).await
    }

    /// Process one turn against an explicit clock. Never fails: every error
    /// becomes reply text.
    pub async fn handle_turn_at(
        &self,
        session: &mut Session,
        input: &str,
        now: DateTime<Utc>,
    ) -> Reply {
        if let Err(e) = self.validate(input) {
            debug!("Rejected chat message: {}", e);
            return Reply::new(validation_message(&e));
        }
        let input = input.trim();

        self.backend.set_context(session.call_context());
        let epoch = session.token_epoch();
        debug!(session = %session.id(), phase = %session.phase(), "Handling chat turn");

        let result = if session.phase().is_auth_dialogue() {
            if session.phase() != Phase::AuthPassword {
                session.push_turn(ChatTurn::user(input));
            }
            login::handle_dialogue(session, self.backend.as_ref(), input).await
        } else {
            let intent = resolve_at(input, now);
            self.record(input, &intent);
            session.push_turn(ChatTurn::user(intent.scrub_input(input)));
            self.dispatcher.dispatch(session, &intent, input, now).await
        };

        let mut reply = result.unwrap_or_else(|e| {
            warn!(session = %session.id(), "Chat turn failed: {}", e);
            Reply::new(TURN_FAILED)
        });

        if session.is_authenticated()
            && session.token_epoch() == epoch
            && self.backend.context().token.is_none()
        {
            if session.phase().is_auth_dialogue() {
                info!(session = %session.id(), "Backend rejected session token during sign-in");
                session.clear_token();
            } else {
                info!(session = %session.id(), "Backend rejected session token; signing out");
                session.sign_out();
            }
            reply.push(SESSION_EXPIRED);
        }

        self.backend.set_context(session.call_context());
        session.push_turn(ChatTurn::assistant(reply.text()));
        reply
    }

    /// Past inputs resembling `partial`. Empty when recall is off or fails.
    pub fn suggest(&self, partial: &str) -> Vec<String> {
        let Some(recall) = &self.recall else {
            return Vec::new();
        };
        recall.suggestions(partial).unwrap_or_else(|e| {
            warn!("Failed to load suggestions: {}", e);
            Vec::new()
        })
    }

    fn record(&self, input: &str, intent: &Intent) {
        if let Some(recall) = &self.recall {
            if let Err(e) = recall.append(input, intent) {
                warn!("Failed to record interaction: {}", e);
            }
        }
    }
}

fn validation_message(err: &ChatError) -> String {
    match err {
        ChatError::Disabled => "Chat is currently disabled.".to_string(),
        ChatError::EmptyMessage => "Please type a message.".to_string(),
        ChatError::MessageTooLong(max) => format!(
            "That message is too long. Please keep it under {} characters.",
            max
        ),
        other => other.to_string(),
    }
}
