use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LedgerChatError, Result};

/// Top-level configuration for the LedgerChat application.
///
/// Loaded from `~/.ledgerchat/config.toml` by default. Every section is
/// optional in the file and falls back to its `Default`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerChatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub recall: RecallConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
}

impl LedgerChatConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LedgerChatConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| LedgerChatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite recall database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.ledgerchat/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// ERP backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL every API path is appended to.
    pub base_url: String,
    /// Prefix applied to relative document links returned by report endpoints.
    pub document_base_url: String,
    /// Per-request timeout applied by the HTTP transport.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.isolaterp.ai".to_string(),
            document_base_url: "https://api.isolaterp.ai".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Conversation handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Whether the chat front-end accepts turns at all.
    pub enabled: bool,
    /// Maximum accepted message length in characters.
    pub max_message_length: usize,
    /// Number of transcript messages kept for the free-form responder.
    pub transcript_turns: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_message_length: 2000,
            transcript_turns: 20,
        }
    }
}

/// Interaction recall settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    /// Record resolved turns for suggestions.
    pub enabled: bool,
    /// Records older than this are purged on read.
    pub retention_days: u32,
    /// Maximum number of suggestions returned per lookup.
    pub max_suggestions: usize,
    /// SQLite file name inside `general.data_dir`.
    pub database_file: String,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 14,
            max_suggestions: 3,
            database_file: "ledgerchat.db".to_string(),
        }
    }
}

/// Optional free-form responder (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    pub enabled: bool,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    /// Environment variable holding the API key. The key itself never lives
    /// in the config file.
    pub api_key_env: String,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}
