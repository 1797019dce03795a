//! Free-form responder for turns the resolver cannot classify.
//!
//! The reply is plain text, optionally carrying a JSON directive that asks
//! the chat layer to run an ERP call. Directives are untrusted; the chat
//! layer validates them before anything is executed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::endpoints;
use crate::error::ErpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, transcript: &[ChatTurn]) -> Result<String, ErpError>;
}

// =============================================================================
// OpenAI-compatible chat completions
// =============================================================================

pub struct OpenAiResponder {
    client: Client,
    api_url: String,
    model: String,
    temperature: f32,
    api_key: SecretString,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionContent,
}

#[derive(Deserialize)]
struct CompletionContent {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiResponder {
    pub fn new(
        api_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, ErpError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            model: model.into(),
            temperature,
            api_key,
        })
    }
}

/// Instructions sent ahead of the transcript.
pub fn system_prompt() -> String {
    let mut prompt = String::from(
        "You are a professional accounting assistant connected to the user's ERP. \
         Answer general questions in plain text. When the user asks you to perform \
         an action, reply with only a fenced ```json block of the form \
         {\"action\": \"EXECUTE_API\", \"endpoint\": \"...\", \"method\": \"GET\" or \"POST\", \
         \"body\": {...}, \"successMessage\": \"...\"}.\n\nAvailable endpoints:\n",
    );
    for endpoint in endpoints::DIRECTIVE_ALLOW_LIST {
        prompt.push_str("- ");
        prompt.push_str(endpoint);
        prompt.push('\n');
    }
    prompt
}

#[async_trait]
impl Responder for OpenAiResponder {
    async fn respond(&self, transcript: &[ChatTurn]) -> Result<String, ErpError> {
        let system = system_prompt();
        let mut messages = vec![CompletionMessage {
            role: "system",
            content: &system,
        }];
        messages.extend(transcript.iter().map(|turn| CompletionMessage {
            role: match turn.role {
                TurnRole::User => "user",
                TurnRole::Assistant => "assistant",
            },
            content: &turn.content,
        }));

        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        debug!(model = %self.model, turns = transcript.len(), "Requesting responder completion");
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ErpError::Responder(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ErpError::Responder(format!(
                "responder returned status {}",
                status.as_u16()
            )));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ErpError::Responder(format!("Failed to parse response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ErpError::Responder("No choices in response".to_string()))
    }
}
