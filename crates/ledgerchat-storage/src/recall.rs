//! Interaction recall: a time-bounded log of past chat inputs and the
//! intents they resolved to, used for autocomplete-style suggestions.
//!
//! The whole log lives under a single key as a JSON array. Retention is
//! enforced on read: expired entries are dropped and, when anything was
//! dropped, the stored value is rewritten.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ledgerchat_core::error::LedgerChatError;
use ledgerchat_core::types::Timestamp;
use ledgerchat_intent::{Intent, IntentKind};

use crate::kv::KeyValueStore;

/// Key under which the interaction log is stored.
pub const RECALL_KEY: &str = "ledgerchat_history";

const DEFAULT_RETENTION_DAYS: u32 = 14;
const DEFAULT_MAX_SUGGESTIONS: usize = 3;

/// One recorded chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub timestamp: Timestamp,
    pub user_input: String,
    pub intent_type: IntentKind,
    #[serde(default)]
    pub intent_params: serde_json::Value,
}

impl Interaction {
    /// Build a record for `intent`, with login passwords scrubbed from both
    /// the params and the raw input.
    pub fn new(user_input: &str, intent: &Intent, timestamp: Timestamp) -> Self {
        let user_input = intent.scrub_input(user_input);

        let intent_params = serde_json::to_value(intent.redacted())
            .ok()
            .and_then(|v| v.get("params").cloned())
            .unwrap_or(serde_json::Value::Null);

        Self {
            timestamp,
            user_input,
            intent_type: intent.kind(),
            intent_params,
        }
    }
}

/// Append-only recall log over a [`KeyValueStore`].
pub struct RecallStore {
    store: Arc<dyn KeyValueStore>,
    retention_days: u32,
    max_suggestions: usize,
}

impl RecallStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            retention_days: DEFAULT_RETENTION_DAYS,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }

    pub fn with_limits(mut self, retention_days: u32, max_suggestions: usize) -> Self {
        self.retention_days = retention_days;
        self.max_suggestions = max_suggestions;
        self
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// Record a resolved turn at the current time.
    pub fn append(&self, user_input: &str, intent: &Intent) -> Result<(), LedgerChatError> {
        self.append_record(Interaction::new(user_input, intent, Timestamp::now()))
    }

    /// Record a prepared interaction. Expired entries are purged as part of
    /// the read that precedes the write.
    pub fn append_record(&self, interaction: Interaction) -> Result<(), LedgerChatError> {
        let mut history = self.list_recent_at(Timestamp::now())?;
        debug!(intent = %interaction.intent_type, "Recording interaction");
        history.push(interaction);
        self.write(&history)
    }

    /// Interactions younger than the retention window, oldest first.
    pub fn list_recent(&self) -> Result<Vec<Interaction>, LedgerChatError> {
        self.list_recent_at(Timestamp::now())
    }

    /// [`list_recent`](Self::list_recent) against an explicit clock.
    pub fn list_recent_at(&self, now: Timestamp) -> Result<Vec<Interaction>, LedgerChatError> {
        let history = self.read()?;
        let total = history.len();

        let valid: Vec<Interaction> = history
            .into_iter()
            .filter(|item| item.timestamp.is_within_days(self.retention_days, now))
            .collect();

        if valid.len() != total {
            debug!(purged = total - valid.len(), "Purged expired interactions");
            self.write(&valid)?;
        }

        Ok(valid)
    }

    /// Up to `max_suggestions` distinct past inputs that contain, or are
    /// contained in, `input` (case-insensitive), in first-seen order.
    pub fn suggestions(&self, input: &str) -> Result<Vec<String>, LedgerChatError> {
        self.suggestions_at(input, Timestamp::now())
    }

    pub fn suggestions_at(
        &self,
        input: &str,
        now: Timestamp,
    ) -> Result<Vec<String>, LedgerChatError> {
        let text = input.trim().to_lowercase();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let suggestions = self
            .list_recent_at(now)?
            .into_iter()
            .map(|item| item.user_input)
            .filter(|past| {
                let past = past.to_lowercase();
                past.contains(&text) || text.contains(&past)
            })
            .filter(|past| seen.insert(past.clone()))
            .take(self.max_suggestions)
            .collect();

        Ok(suggestions)
    }

    fn read(&self) -> Result<Vec<Interaction>, LedgerChatError> {
        let Some(raw) = self.store.get(RECALL_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(history) => Ok(history),
            Err(e) => {
                warn!("Discarding unreadable interaction history: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn write(&self, history: &[Interaction]) -> Result<(), LedgerChatError> {
        let raw = serde_json::to_string(history)?;
        self.store.set(RECALL_KEY, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::kv::{MemoryKeyValueStore, SqliteKeyValueStore};
    use ledgerchat_intent::{AmountParams, LoginParams};

    const DAY: i64 = 86_400;

    fn memory_store() -> (Arc<MemoryKeyValueStore>, RecallStore) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let recall = RecallStore::new(kv.clone());
        (kv, recall)
    }

    fn record(input: &str, ts: Timestamp) -> Interaction {
        Interaction::new(input, &Intent::Help, ts)
    }

    #[test]
    fn test_append_and_list() {
        let (_, recall) = memory_store();
        let sale = Intent::RecordSale(AmountParams {
            amount: Some("500".into()),
        });
        recall.append("sale of 500", &sale).unwrap();
        recall.append("help", &Intent::Help).unwrap();

        let history = recall.list_recent().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].user_input, "sale of 500");
        assert_eq!(history[0].intent_type, IntentKind::RecordSale);
        assert_eq!(history[0].intent_params["amount"], "500");
        assert_eq!(history[1].intent_type, IntentKind::Help);
    }

    #[test]
    fn test_expired_records_are_purged_and_rewritten() {
        let (kv, recall) = memory_store();
        let now = Timestamp(1_800_000_000);
        let old = record("old", Timestamp(now.0 - 15 * DAY));
        let fresh = record("fresh", Timestamp(now.0 - DAY));
        kv.set(
            RECALL_KEY,
            &serde_json::to_string(&vec![old, fresh.clone()]).unwrap(),
        )
        .unwrap();

        let history = recall.list_recent_at(now).unwrap();
        assert_eq!(history, vec![fresh.clone()]);

        let stored: Vec<Interaction> =
            serde_json::from_str(&kv.get(RECALL_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, vec![fresh]);
    }

    #[test]
    fn test_retention_boundary_is_exclusive() {
        let (kv, recall) = memory_store();
        let now = Timestamp(1_800_000_000);
        let at_limit = record("at limit", Timestamp(now.0 - 14 * DAY));
        let inside = record("inside", Timestamp(now.0 - 14 * DAY + 1));
        kv.set(
            RECALL_KEY,
            &serde_json::to_string(&vec![at_limit, inside]).unwrap(),
        )
        .unwrap();

        let history = recall.list_recent_at(now).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user_input, "inside");
    }

    #[test]
    fn test_custom_retention() {
        let (kv, recall) = memory_store();
        let recall = recall.with_limits(1, 3);
        let now = Timestamp(1_800_000_000);
        kv.set(
            RECALL_KEY,
            &serde_json::to_string(&vec![record("yesterday", Timestamp(now.0 - 2 * DAY))])
                .unwrap(),
        )
        .unwrap();
        assert!(recall.list_recent_at(now).unwrap().is_empty());
        assert_eq!(recall.retention_days(), 1);
    }

    #[test]
    fn test_suggestions_match_both_directions_and_dedupe() {
        let (_, recall) = memory_store();
        for input in [
            "show items",
            "Show Items",
            "show items",
            "sale of 500",
            "show customers",
            "show vendors",
        ] {
            recall.append(input, &Intent::Unknown).unwrap();
        }

        assert_eq!(
            recall.suggestions("SHOW").unwrap(),
            vec!["show items", "Show Items", "show customers"]
        );
        // Prior input contained in the new text.
        assert_eq!(
            recall.suggestions("sale of 500 to acme").unwrap(),
            vec!["sale of 500"]
        );
        assert!(recall.suggestions("ledger").unwrap().is_empty());
        assert!(recall.suggestions("   ").unwrap().is_empty());
    }

    #[test]
    fn test_login_is_recorded_without_password() {
        let (kv, recall) = memory_store();
        let login = Intent::Login(LoginParams {
            email: Some("bob@x.com".into()),
            password: Some("Secret123".into()),
            tenant_id: None,
        });
        recall
            .append("login bob@x.com password Secret123", &login)
            .unwrap();

        let raw = kv.get(RECALL_KEY).unwrap().unwrap();
        assert!(!raw.contains("Secret123"));

        let history = recall.list_recent().unwrap();
        assert_eq!(history[0].user_input, "login bob@x.com password ***");
        assert_eq!(history[0].intent_params["email"], "bob@x.com");
        assert!(history[0].intent_params["password"].is_null());
    }

    #[test]
    fn test_unreadable_history_is_treated_as_empty() {
        let (kv, recall) = memory_store();
        kv.set(RECALL_KEY, "{not json").unwrap();
        assert!(recall.list_recent().unwrap().is_empty());

        recall.append("help", &Intent::Help).unwrap();
        assert_eq!(recall.list_recent().unwrap().len(), 1);
    }

    #[test]
    fn test_recall_persists_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recall.db");
        {
            let db = Arc::new(Database::new(&path).unwrap());
            let recall = RecallStore::new(Arc::new(SqliteKeyValueStore::new(db)));
            recall.append("show items", &Intent::ListItems).unwrap();
        }
        let db = Arc::new(Database::new(&path).unwrap());
        let recall = RecallStore::new(Arc::new(SqliteKeyValueStore::new(db)));
        let history = recall.list_recent().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].intent_type, IntentKind::ListItems);
    }
}
