mod cli;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, BufReader};

use ledgerchat_chat::{ChatOrchestrator, Session};
use ledgerchat_core::LedgerChatConfig;
use ledgerchat_erp::{ErpBackend, ErpClient, HttpTransport, OpenAiResponder, Responder};
use ledgerchat_storage::{Database, RecallStore, SqliteKeyValueStore};

use cli::{expand_home, CliArgs};

/// Build the recall store, or `None` when recall is off or the database
/// cannot be opened.
fn open_recall(config: &LedgerChatConfig) -> Option<RecallStore> {
    if !config.recall.enabled {
        tracing::info!("Interaction recall disabled");
        return None;
    }

    let data_dir = expand_home(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return None;
    }

    let db_path = data_dir.join(&config.recall.database_file);
    match Database::new(&db_path) {
        Ok(db) => {
            tracing::info!(path = %db_path.display(), "SQLite database opened");
            let store = SqliteKeyValueStore::new(Arc::new(db));
            Some(
                RecallStore::new(Arc::new(store))
                    .with_limits(config.recall.retention_days, config.recall.max_suggestions),
            )
        }
        Err(e) => {
            tracing::warn!(path = %db_path.display(), error = %e, "Recall unavailable");
            None
        }
    }
}

/// Build the free-form responder when enabled and its key is present.
fn open_responder(config: &LedgerChatConfig) -> Option<Arc<dyn Responder>> {
    let cfg = &config.responder;
    if !cfg.enabled {
        return None;
    }
    let Ok(key) = std::env::var(&cfg.api_key_env) else {
        tracing::warn!(env = %cfg.api_key_env, "Responder enabled but API key is not set");
        return None;
    };

    let timeout = Duration::from_secs(config.backend.request_timeout_secs);
    match OpenAiResponder::new(
        cfg.api_url.clone(),
        cfg.model.clone(),
        cfg.temperature,
        SecretString::new(key),
        timeout,
    ) {
        Ok(responder) => {
            tracing::info!(model = %cfg.model, "Free-form responder ready");
            Some(Arc::new(responder))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to build responder");
            None
        }
    }
}

fn prompt(session: &Session) {
    let label = match session.tenant_id() {
        Some(tenant) if session.is_authenticated() => format!("{}@{}", session.phase(), tenant),
        _ => session.phase().to_string(),
    };
    print!("[{}] > ", label);
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = LedgerChatConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    config.backend.base_url = args.resolve_base_url(&config.backend.base_url);
    if args.no_recall {
        config.recall.enabled = false;
    }

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting LedgerChat v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Backend.
    let transport = HttpTransport::new(
        config.backend.base_url.clone(),
        Duration::from_secs(config.backend.request_timeout_secs),
    )?;
    let backend: Arc<dyn ErpBackend> = Arc::new(ErpClient::new(transport));
    tracing::info!(url = %config.backend.base_url, "ERP client ready");

    let mut chat = ChatOrchestrator::new(
        config.chat.clone(),
        backend,
        config.backend.document_base_url.clone(),
    );
    if let Some(recall) = open_recall(&config) {
        chat = chat.with_recall(recall);
    }
    if let Some(responder) = open_responder(&config) {
        chat = chat.with_responder(responder);
    }

    let mut session = chat.new_session();
    println!(
        "LedgerChat. Type 'help' for examples, '/suggest <text>' for recent inputs, '/quit' to leave."
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(&session);
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "/quit" || line == "/exit" {
            break;
        }
        if let Some(partial) = line.strip_prefix("/suggest") {
            for suggestion in chat.suggest(partial.trim()) {
                println!("  {}", suggestion);
            }
            prompt(&session);
            continue;
        }
        if line.is_empty() {
            prompt(&session);
            continue;
        }

        let reply = chat.handle_turn(&mut session, line).await;
        println!("{}", reply.text());
        if let Some(report) = &reply.report {
            println!("\n{}", report);
        }
        prompt(&session);
    }

    tracing::info!(session = %session.id(), "Session ended");
    Ok(())
}
