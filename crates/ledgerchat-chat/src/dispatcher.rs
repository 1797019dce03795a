//! Intent dispatch: one resolved intent in, backend calls made, one reply out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use ledgerchat_erp::services::value_text;
use ledgerchat_erp::{ErpBackend, PurchaseDetails, Responder, SaleDetails};
use ledgerchat_intent::extract::six_months_ending;
use ledgerchat_intent::{
    AmountParams, DateRange, Intent, IntentKind, LedgerParams, ReportParams, SearchParams,
};

use crate::directive::{self, Directive, ResponderReply};
use crate::error::ChatError;
use crate::report::{build_sections, fetch_live_figures, resolve_document_link};
use crate::response::{Reply, ReportCard, HELP_TEXT, NOT_SURE};
use crate::session::{login, Session};

/// Words that turn a successful single-shot login into a login plus report.
const REPORT_FOLLOW_UP: &[&str] = &["balance sheet", "report", "pnl", "profit"];
const PNL_FOLLOW_UP: &[&str] = &["profit", "pnl", "loss"];

pub struct Dispatcher {
    backend: Arc<dyn ErpBackend>,
    responder: Option<Arc<dyn Responder>>,
    document_base_url: String,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn ErpBackend>, document_base_url: impl Into<String>) -> Self {
        Self {
            backend,
            responder: None,
            document_base_url: document_base_url.into(),
        }
    }

    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Run `intent` for `session`. `input` is the raw text the intent was
    /// resolved from.
    pub async fn dispatch(
        &self,
        session: &mut Session,
        intent: &Intent,
        input: &str,
        now: DateTime<Utc>,
    ) -> Result<Reply, ChatError> {
        let kind = intent.kind();
        if kind.requires_auth() && !session.is_authenticated() {
            debug!(intent = %kind, "Refusing guarded intent without a session token");
            return Ok(Reply::new(sign_in_prompt(kind)));
        }

        let backend = self.backend.as_ref();
        let reply = match intent {
            Intent::Login(params) => {
                let (mut reply, signed_in) = login::single_shot(session, backend, params).await?;
                let lower = input.to_lowercase();
                if signed_in && contains_any(&lower, REPORT_FOLLOW_UP) {
                    backend.set_context(session.call_context());
                    reply.extend(self.follow_up_report(&lower, now).await);
                }
                reply
            }
            Intent::RecordSale(params) => self.record_sale(params).await,
            Intent::RecordPurchase(params) => self.record_purchase(params).await,
            Intent::GetReport(params) => self.report(params, now).await,
            Intent::GetLedger(params) => self.ledger(params, now).await,
            Intent::ListCustomers => self.listing(Listing::Customers).await,
            Intent::ListItems => self.listing(Listing::Items).await,
            Intent::ListVendors => self.listing(Listing::Vendors).await,
            Intent::SearchCustomer(params) => self.search_customer(params).await,
            Intent::SwitchTenant(params) => login::switch_tenant(session, backend, params)?,
            Intent::Help => Reply::new(HELP_TEXT),
            Intent::Unknown => self.unknown(session).await,
        };
        Ok(reply)
    }

    // =========================================================================
    // Bookkeeping
    // =========================================================================

    async fn record_sale(&self, params: &AmountParams) -> Reply {
        let amount = params.amount.as_deref();
        let mut reply = Reply::new(format!(
            "Recording a sale for ${}. Confirming details...",
            amount.unwrap_or("...")
        ));
        match self
            .backend
            .record_sale(&SaleDetails::walk_in(amount))
            .await
        {
            Ok(receipt) => {
                info!(invoice = ?receipt.document_number, "Sale recorded");
                reply.push(format!(
                    "Successfully recorded sale. Invoice No: {}, Voucher: {}.",
                    receipt.document_number.as_deref().unwrap_or("n/a"),
                    receipt.voucher_number.as_deref().unwrap_or("n/a")
                ));
            }
            Err(e) => {
                warn!("Recording sale failed: {}", e);
                reply.push(format!("Failed to record sale: {}", e));
            }
        }
        reply
    }

    async fn record_purchase(&self, params: &AmountParams) -> Reply {
        let amount = params.amount.as_deref();
        let mut reply = Reply::new(format!(
            "Recording a purchase for ${}. Processing bill...",
            amount.unwrap_or("...")
        ));
        match self
            .backend
            .record_purchase(&PurchaseDetails::general_expense(amount))
            .await
        {
            Ok(receipt) => {
                info!(bill = ?receipt.document_number, "Purchase recorded");
                reply.push(format!(
                    "Successfully recorded purchase. Bill No: {}, Voucher: {}.",
                    receipt.document_number.as_deref().unwrap_or("n/a"),
                    receipt.voucher_number.as_deref().unwrap_or("n/a")
                ));
            }
            Err(e) => {
                warn!("Recording purchase failed: {}", e);
                reply.push(format!("Failed to record purchase: {}", e));
            }
        }
        reply
    }

    // =========================================================================
    // Reports
    // =========================================================================

    async fn report(&self, params: &ReportParams, now: DateTime<Utc>) -> Reply {
        let is_pnl = params.is_pnl || params.date_range.is_some();
        let mut reply = Reply::new("Fetching live data for your report...");
        let card = self.report_card(is_pnl, params.date_range, now).await;
        reply.push(format!(
            "Generated your {} using real-time ERP data.",
            card.title
        ));
        reply.report = Some(card);
        reply
    }

    async fn follow_up_report(&self, lower: &str, now: DateTime<Utc>) -> Reply {
        let is_pnl = contains_any(lower, PNL_FOLLOW_UP);
        let mut reply = Reply::new("Fetching your financial data for the report...");
        let mut card = self.report_card(is_pnl, None, now).await;
        if is_pnl {
            card.title = "Profit & Loss (Last 6 Months)".to_string();
        }
        card.summary =
            "Your statement has been generated with live data from your ERP.".to_string();
        reply.push(format!("Your {} is ready!", card.title));
        reply.report = Some(card);
        reply
    }

    /// Fetch the document and the live figures concurrently. P&L defaults to
    /// the six months ending `now`; a balance sheet is as of `now`.
    async fn report_card(
        &self,
        is_pnl: bool,
        range: Option<DateRange>,
        now: DateTime<Utc>,
    ) -> ReportCard {
        let backend = self.backend.as_ref();
        let document = async {
            if is_pnl {
                let range = range.unwrap_or_else(|| six_months_ending(now));
                backend.profit_and_loss(range.from, range.to).await
            } else {
                backend.balance_sheet(now).await
            }
        };

        let (document, figures) = tokio::join!(document, fetch_live_figures(backend));

        let link = match document {
            Ok(doc) => doc.link,
            Err(e) => {
                warn!("Report document unavailable: {}", e);
                None
            }
        };

        ReportCard {
            title: if is_pnl {
                "Profit & Loss Statement".to_string()
            } else {
                "Balance Sheet".to_string()
            },
            summary: "Real-time financial summary.".to_string(),
            document_link: resolve_document_link(link.as_deref(), &self.document_base_url),
            sections: build_sections(&figures),
        }
    }

    async fn ledger(&self, params: &LedgerParams, now: DateTime<Utc>) -> Reply {
        let account = params.account.trim();
        if account.is_empty() {
            return Reply::new(
                "Which account's ledger would you like to see? For example, \"ledger for Cash\".",
            );
        }

        let range = six_months_ending(now);
        let mut reply = Reply::new(format!("Fetching the ledger: {}...", account));
        match self
            .backend
            .account_ledger(account, range.from, range.to)
            .await
        {
            Ok(doc) => reply.push(format!(
                "Your ledger ({}) for the last 6 months is ready: {}",
                account,
                resolve_document_link(doc.link.as_deref(), &self.document_base_url)
            )),
            Err(e) => {
                warn!("Ledger request failed: {}", e);
                reply.push(format!("Failed to fetch ledger: {}", e));
            }
        }
        reply
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    async fn listing(&self, listing: Listing) -> Reply {
        let mut reply = Reply::new(listing.progress());
        let rows = match listing {
            Listing::Customers => self.backend.customers(None).await,
            Listing::Items => self.backend.items(None).await,
            Listing::Vendors => self.backend.vendors(None).await,
        };
        match rows {
            Ok(rows) => reply.push(
                format!(
                    "Found {} {}:\n\n{}",
                    rows.len(),
                    listing.noun(),
                    bullets(&rows, |row| title(row, listing.title_field()))
                )
                .trim_end()
                .to_string(),
            ),
            Err(e) => {
                warn!("Listing failed: {}", e);
                reply.push(listing.failure());
            }
        }
        reply
    }

    async fn search_customer(&self, params: &SearchParams) -> Reply {
        let query = params.query.trim();
        if query.is_empty() {
            return Reply::new("Who should I look for? For example, \"find customer Acme\".");
        }

        let mut reply = Reply::new(format!("Searching for customer: \"{}\"...", query));
        match self.backend.customers(Some(query)).await {
            Ok(rows) if !rows.is_empty() => reply.push(format!(
                "I found {} matching customers:\n\n{}",
                rows.len(),
                bullets(&rows, |row| format!(
                    "{} (ID: {})",
                    title(row, "customerTitle"),
                    row.get("id").and_then(value_text).unwrap_or_default()
                ))
            )),
            Ok(_) => reply.push(format!("No customers found matching \"{}\".", query)),
            Err(e) => {
                warn!("Customer search failed: {}", e);
                reply.push(format!("Could not search customers: {}", e));
            }
        }
        reply
    }

    // =========================================================================
    // Free-form fallback
    // =========================================================================

    async fn unknown(&self, session: &Session) -> Reply {
        let Some(responder) = &self.responder else {
            return Reply::new(NOT_SURE);
        };

        let text = match responder.respond(&session.transcript()).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Responder failed: {}", e);
                return Reply::new(NOT_SURE);
            }
        };

        match directive::interpret(&text) {
            ResponderReply::Text(text) => Reply::new(text),
            ResponderReply::Directive(directive) => self.run_directive(session, &directive).await,
        }
    }

    async fn run_directive(&self, session: &Session, directive: &Directive) -> Reply {
        let request = match directive::validate(directive, session.is_authenticated()) {
            Ok(request) => request,
            Err(e) => {
                warn!(endpoint = ?directive.endpoint, "Refused responder directive: {}", e);
                return Reply::new(format!("I can't run that action ({}).", e));
            }
        };

        info!(
            endpoint = %request.endpoint,
            method = %request.method,
            "Executing responder directive"
        );
        let mut reply = Reply::new(format!("Executing action on {}...", request.endpoint));
        let response = self.backend.execute(request).await;
        if response.success {
            reply.push(
                directive
                    .success_message
                    .clone()
                    .unwrap_or_else(|| "Action completed successfully.".to_string()),
            );
        } else {
            reply.push(format!(
                "Action failed: {}",
                response.error.as_deref().unwrap_or("Unknown error")
            ));
        }
        reply
    }
}

#[derive(Debug, Clone, Copy)]
enum Listing {
    Customers,
    Items,
    Vendors,
}

impl Listing {
    fn progress(self) -> &'static str {
        match self {
            Listing::Customers => "Retrieving customer list...",
            Listing::Items => "Retrieving inventory items...",
            Listing::Vendors => "Retrieving vendor list...",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Listing::Customers => "customers",
            Listing::Items => "items in inventory",
            Listing::Vendors => "vendors",
        }
    }

    fn title_field(self) -> &'static str {
        match self {
            Listing::Customers => "customerTitle",
            Listing::Items => "inventoryItemTitle",
            Listing::Vendors => "venderTitle",
        }
    }

    fn failure(self) -> &'static str {
        match self {
            Listing::Customers => "Could not retrieve customers.",
            Listing::Items => "Could not retrieve items.",
            Listing::Vendors => "Could not retrieve vendors.",
        }
    }
}

fn sign_in_prompt(kind: IntentKind) -> &'static str {
    match kind {
        IntentKind::RecordSale => {
            "You need to be signed in to record a sale. Would you like to log in now?"
        }
        IntentKind::RecordPurchase => {
            "You need to be signed in to record a purchase. Would you like to log in now?"
        }
        IntentKind::GetReport => {
            "I can help with reports! Please log in first so I can access your data."
        }
        _ => "Please log in first so I can access your data.",
    }
}

fn title(row: &Value, field: &str) -> String {
    row.get(field)
        .and_then(value_text)
        .unwrap_or_else(|| "(untitled)".to_string())
}

fn bullets(rows: &[Value], render: impl Fn(&Value) -> String) -> String {
    rows.iter()
        .map(|row| format!("• {}", render(row)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn contains_any(lower: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| lower.contains(n))
}
