//! End-to-end conversations against the in-memory ERP backend.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;

use ledgerchat_chat::orchestrator::SESSION_EXPIRED;
use ledgerchat_chat::{ChatOrchestrator, Phase, Session};
use ledgerchat_core::config::ChatConfig;
use ledgerchat_core::types::TenantCandidate;
use ledgerchat_erp::{ErpBackend, MockCall, MockErp, ScriptedResponder, TurnRole};
use ledgerchat_storage::{Database, RecallStore, SqliteKeyValueStore};

fn acme_and_globex() -> Vec<TenantCandidate> {
    vec![
        TenantCandidate::new("Acme", "1"),
        TenantCandidate::new("Globex", "2"),
    ]
}

fn chat(erp: &Arc<MockErp>) -> ChatOrchestrator {
    let backend: Arc<dyn ErpBackend> = erp.clone();
    ChatOrchestrator::new(ChatConfig::default(), backend, "https://api.isolaterp.ai")
}

async fn sign_in_by_dialogue(chat: &ChatOrchestrator, session: &mut Session, choice: &str) {
    chat.handle_turn(session, "login").await;
    assert_eq!(session.phase(), Phase::AuthEmail);
    chat.handle_turn(session, "bob@x.com").await;
    assert_eq!(session.phase(), Phase::AuthPassword);
    chat.handle_turn(session, "Secret123").await;
    assert_eq!(session.phase(), Phase::TenantSelection);
    chat.handle_turn(session, choice).await;
}

#[tokio::test]
async fn dialogue_login_selects_company_by_index() {
    let erp = Arc::new(MockErp::new().with_user("bob@x.com", "Secret123", acme_and_globex()));
    let chat = chat(&erp);
    let mut session = chat.new_session();

    let reply = chat.handle_turn(&mut session, "login").await;
    assert_eq!(
        reply.last_message(),
        Some("Please provide your email address to sign in.")
    );

    let reply = chat.handle_turn(&mut session, "bob@x.com").await;
    assert_eq!(session.phase(), Phase::AuthPassword);
    assert_eq!(
        reply.last_message(),
        Some("Great. Now, please enter your password to continue.")
    );

    let reply = chat.handle_turn(&mut session, "Secret123").await;
    assert_eq!(session.phase(), Phase::TenantSelection);
    assert_eq!(session.pending().unwrap().tenants, acme_and_globex());
    assert!(reply.text().contains("1. Acme\n2. Globex"));

    let reply = chat.handle_turn(&mut session, "2").await;
    assert_eq!(session.phase(), Phase::Ready);
    assert_eq!(session.tenant_id(), Some("2"));
    assert!(session.pending().is_none());
    assert!(reply.text().starts_with("Context set to \"Globex\"."));

    // The backend now sends the new token and tenant.
    let ctx = erp.context();
    assert!(ctx.token.is_some());
    assert_eq!(ctx.tenant_id.as_deref(), Some("2"));
}

#[tokio::test]
async fn dialogue_login_selects_company_by_name() {
    let erp = Arc::new(MockErp::new().with_user("bob@x.com", "Secret123", acme_and_globex()));
    let chat = chat(&erp);
    let mut session = chat.new_session();

    sign_in_by_dialogue(&chat, &mut session, "acme").await;
    assert_eq!(session.phase(), Phase::Ready);
    assert_eq!(session.tenant_id(), Some("1"));
    assert_eq!(session.known_tenants(), acme_and_globex().as_slice());
}

#[tokio::test]
async fn invalid_selection_holds_phase() {
    let erp = Arc::new(MockErp::new().with_user("bob@x.com", "Secret123", acme_and_globex()));
    let chat = chat(&erp);
    let mut session = chat.new_session();

    sign_in_by_dialogue(&chat, &mut session, "7").await;
    assert_eq!(session.phase(), Phase::TenantSelection);
    assert!(session.tenant_id().is_none());
}

#[tokio::test]
async fn resolver_is_not_consulted_mid_dialogue() {
    let erp = Arc::new(MockErp::new().with_user("bob@x.com", "Secret123", acme_and_globex()));
    let chat = chat(&erp);
    let mut session = chat.new_session();

    chat.handle_turn(&mut session, "login").await;
    // Looks like a sale, but is treated as the email answer.
    chat.handle_turn(&mut session, "sale of 500").await;
    assert_eq!(session.phase(), Phase::AuthEmail);
    assert_eq!(
        erp.calls(),
        vec![MockCall::LookupTenants {
            email: "sale of 500".into()
        }]
    );
}

#[tokio::test]
async fn password_never_reaches_transcript_or_recall() {
    let erp = Arc::new(MockErp::new().with_user("bob@x.com", "Secret123", acme_and_globex()));
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::new(&dir.path().join("recall.db")).unwrap());
    let recall = RecallStore::new(Arc::new(SqliteKeyValueStore::new(db)));
    let chat = chat(&erp).with_recall(recall);
    let mut session = chat.new_session();

    sign_in_by_dialogue(&chat, &mut session, "1").await;
    chat.handle_turn(&mut session, "login bob@x.com password Secret123 tenant Acme")
        .await;

    for turn in session.transcript() {
        assert!(!turn.content.contains("Secret123"), "{:?}", turn);
    }
    assert!(chat.suggest("login").iter().all(|s| !s.contains("Secret123")));
    assert_eq!(
        chat.suggest("login bob"),
        vec!["login", "login bob@x.com password *** tenant Acme"]
    );
}

#[tokio::test]
async fn sale_without_token_makes_no_backend_calls() {
    let erp = Arc::new(MockErp::new());
    let chat = chat(&erp);
    let mut session = chat.new_session();

    let reply = chat.handle_turn(&mut session, "record a sale of 500").await;
    assert_eq!(
        reply.last_message(),
        Some("You need to be signed in to record a sale. Would you like to log in now?")
    );
    assert!(erp.calls().is_empty());
    assert_eq!(session.phase(), Phase::Greeting);
}

#[tokio::test]
async fn single_shot_login_then_sale() {
    let erp = Arc::new(MockErp::new().with_user("bob@x.com", "Secret123", acme_and_globex()));
    let chat = chat(&erp);
    let mut session = chat.new_session();

    let reply = chat
        .handle_turn(&mut session, "login bob@x.com password Secret123 tenant Acme")
        .await;
    assert_eq!(session.phase(), Phase::Ready);
    assert_eq!(session.tenant_id(), Some("Acme"));
    assert_eq!(reply.messages[0], "Logging you into tenant: Acme...");

    let reply = chat.handle_turn(&mut session, "sale of 500").await;
    assert_eq!(
        reply.last_message(),
        Some("Successfully recorded sale. Invoice No: INV-2, Voucher: SV-2.")
    );
    match &erp.calls()[1] {
        MockCall::RecordSale(details) => {
            assert_eq!(details.customer_title, "Walk-in Customer");
            assert_eq!(details.unit_price, "500");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn single_shot_login_with_report_request() {
    let erp = Arc::new(
        MockErp::new()
            .with_user("bob@x.com", "Secret123", acme_and_globex())
            .with_invoices(vec![json!({"netValue": 1000})])
            .with_bills(vec![json!({"netValue": 400})])
            .with_banks(vec![json!({"balance": 200})]),
    );
    let chat = chat(&erp);
    let mut session = chat.new_session();

    let reply = chat
        .handle_turn(
            &mut session,
            "login bob@x.com password Secret123 and show my balance sheet",
        )
        .await;

    assert_eq!(session.phase(), Phase::Ready);
    assert_eq!(reply.last_message(), Some("Your Balance Sheet is ready!"));
    let card = reply.report.expect("report attached");
    assert_eq!(card.title, "Balance Sheet");
    let totals: Vec<Option<f64>> = card.sections.iter().map(|s| s.total).collect();
    assert_eq!(totals, vec![Some(1200.0), Some(400.0), Some(600.0)]);
}

#[tokio::test]
async fn failed_single_shot_login_discovers_companies_and_reauthenticates() {
    let erp = Arc::new(MockErp::new().with_user("bob@x.com", "Secret123", acme_and_globex()));
    let chat = chat(&erp);
    let mut session = chat.new_session();

    chat.handle_turn(&mut session, "login bob@x.com password wrongpw").await;
    assert_eq!(session.phase(), Phase::TenantSelection);
    assert!(!session.is_authenticated());

    let reply = chat.handle_turn(&mut session, "Globex").await;
    assert_eq!(session.phase(), Phase::AuthPassword);
    assert_eq!(
        reply.last_message(),
        Some("Please enter your password for Globex.")
    );

    chat.handle_turn(&mut session, "Secret123").await;
    assert_eq!(session.phase(), Phase::Ready);
    assert_eq!(session.tenant_id(), Some("2"));
    assert_eq!(
        erp.calls().last(),
        Some(&MockCall::Authenticate {
            email: "bob@x.com".into(),
            tenant: Some("Globex".into()),
        })
    );
}

#[tokio::test]
async fn wrong_password_in_dialogue_is_retryable() {
    let erp = Arc::new(MockErp::new().with_user("bob@x.com", "Secret123", acme_and_globex()));
    let chat = chat(&erp);
    let mut session = chat.new_session();

    chat.handle_turn(&mut session, "login").await;
    chat.handle_turn(&mut session, "bob@x.com").await;
    for _ in 0..3 {
        let reply = chat.handle_turn(&mut session, "guess").await;
        assert_eq!(
            reply.last_message(),
            Some("Incorrect password. Please try again.")
        );
        assert_eq!(session.phase(), Phase::AuthPassword);
    }
    chat.handle_turn(&mut session, "Secret123").await;
    assert_eq!(session.phase(), Phase::TenantSelection);
}

#[tokio::test]
async fn report_with_partial_failure_degrades_sections() {
    let erp = Arc::new(
        MockErp::new()
            .with_user("bob@x.com", "Secret123", acme_and_globex())
            .with_invoices(vec![json!({"netValue": 1000})])
            .with_bills(vec![json!({"netValue": 400})])
            .with_banks_error("bank service down"),
    );
    let chat = chat(&erp);
    let mut session = chat.new_session();
    chat.handle_turn(&mut session, "login bob@x.com password Secret123 tenant Acme")
        .await;

    let reply = chat.handle_turn(&mut session, "show me a report").await;
    let card = reply.report.expect("report attached");
    assert_eq!(card.sections[0].total, None);
    assert_eq!(card.sections[0].lines[0].name, "Failed to fetch live data");
    assert_eq!(card.sections[1].total, Some(400.0));
    assert_eq!(card.sections[2].total, Some(600.0));
}

#[tokio::test]
async fn pnl_for_last_six_months_uses_explicit_range() {
    let erp = Arc::new(MockErp::new().with_user("bob@x.com", "Secret123", acme_and_globex()));
    let chat = chat(&erp);
    let mut session = chat.new_session();
    chat.handle_turn(&mut session, "login bob@x.com password Secret123 tenant Acme")
        .await;

    let now = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
    let reply = chat
        .handle_turn_at(&mut session, "profit and loss for the last 6 months", now)
        .await;
    assert_eq!(reply.report.unwrap().title, "Profit & Loss Statement");
    assert!(erp.calls().contains(&MockCall::ProfitAndLoss {
        from: Utc.with_ymd_and_hms(2025, 12, 15, 12, 0, 0).unwrap(),
        to: now,
    }));
}

#[tokio::test]
async fn switch_company_with_pin_and_without() {
    let erp = Arc::new(MockErp::new().with_user("bob@x.com", "Secret123", acme_and_globex()));
    let chat = chat(&erp);
    let mut session = chat.new_session();
    sign_in_by_dialogue(&chat, &mut session, "1").await;

    chat.handle_turn(&mut session, "switch pin 9001").await;
    assert_eq!(session.phase(), Phase::Ready);
    assert_eq!(session.tenant_id(), Some("9001"));
    assert_eq!(erp.context().tenant_id.as_deref(), Some("9001"));

    let reply = chat.handle_turn(&mut session, "change company").await;
    assert_eq!(session.phase(), Phase::TenantSelection);
    assert!(reply.text().contains("1. Acme\n2. Globex"));

    chat.handle_turn(&mut session, "globex").await;
    assert_eq!(session.phase(), Phase::Ready);
    assert_eq!(session.tenant_id(), Some("2"));
}

#[tokio::test]
async fn cancel_leaves_dialogue() {
    let erp = Arc::new(MockErp::new().with_user("bob@x.com", "Secret123", acme_and_globex()));
    let chat = chat(&erp);
    let mut session = chat.new_session();

    chat.handle_turn(&mut session, "login").await;
    chat.handle_turn(&mut session, "bob@x.com").await;
    chat.handle_turn(&mut session, "cancel").await;
    assert_eq!(session.phase(), Phase::Greeting);
    assert!(session.pending().is_none());
}

#[tokio::test]
async fn expired_token_signs_the_session_out() {
    let erp = Arc::new(
        MockErp::new()
            .with_user("bob@x.com", "Secret123", acme_and_globex())
            .with_expired_session(),
    );
    let chat = chat(&erp);
    let mut session = chat.new_session();
    chat.handle_turn(&mut session, "login bob@x.com password Secret123 tenant Acme")
        .await;
    assert_eq!(session.phase(), Phase::Ready);

    let reply = chat.handle_turn(&mut session, "sale of 20").await;
    assert!(reply.text().contains("Failed to record sale"));
    assert_eq!(reply.last_message(), Some(SESSION_EXPIRED));
    assert_eq!(session.phase(), Phase::Greeting);
    assert!(!session.is_authenticated());
    assert_eq!(session.tenant_id(), Some("Acme"));
}

#[tokio::test]
async fn expired_token_during_sign_in_keeps_the_dialogue() {
    let erp = Arc::new(
        MockErp::new()
            .with_user("bob@x.com", "Secret123", acme_and_globex())
            .with_expired_session(),
    );
    let chat = chat(&erp);
    let mut session = chat.new_session();
    chat.handle_turn(&mut session, "login bob@x.com password Secret123 tenant Acme")
        .await;
    chat.handle_turn(&mut session, "login").await;
    assert_eq!(session.phase(), Phase::AuthEmail);

    let reply = chat.handle_turn(&mut session, "bob@x.com").await;
    assert_eq!(reply.last_message(), Some(SESSION_EXPIRED));
    assert_eq!(session.phase(), Phase::AuthEmail);
    assert!(!session.is_authenticated());

    chat.handle_turn(&mut session, "bob@x.com").await;
    assert_eq!(session.phase(), Phase::AuthPassword);
}

#[tokio::test]
async fn unknown_turn_goes_to_responder_with_transcript() {
    let erp = Arc::new(MockErp::new());
    let responder = Arc::new(ScriptedResponder::new(vec![
        "Accrual accounting records revenue when earned.",
    ]));
    let chat = chat(&erp).with_responder(responder.clone());
    let mut session = chat.new_session();

    chat.handle_turn(&mut session, "help").await;
    let reply = chat
        .handle_turn(&mut session, "what is accrual accounting?")
        .await;
    assert_eq!(
        reply.last_message(),
        Some("Accrual accounting records revenue when earned.")
    );

    let transcripts = responder.transcripts();
    assert_eq!(transcripts.len(), 1);
    let sent = &transcripts[0];
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[2].role, TurnRole::User);
    assert_eq!(sent[2].content, "what is accrual accounting?");
}
