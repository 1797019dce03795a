//! In-memory ERP backend that records every call.
//!
//! Used by the chat layer's tests and available to downstream crates for
//! demos. Configure it with the `with_*` builders, share it behind an
//! `Arc`, and inspect [`MockErp::calls`] afterwards.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use ledgerchat_core::types::TenantCandidate;

use crate::error::ErpError;
use crate::responder::{ChatTurn, Responder};
use crate::services::{
    AccessToken, AuthService, BookkeepingService, ErpBackend, PurchaseDetails, RecordReceipt,
    ReportDocument, ReportingService, SaleDetails,
};
use crate::transport::{ApiRequest, ApiResponse, CallContext};

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Authenticate {
        email: String,
        tenant: Option<String>,
    },
    LookupTenants { email: String },
    RecordSale(SaleDetails),
    RecordPurchase(PurchaseDetails),
    BalanceSheet,
    ProfitAndLoss {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    AccountLedger { account: String },
    Invoices,
    Bills,
    Banks,
    Customers { query: Option<String> },
    Items,
    Vendors,
    Execute(ApiRequest),
}

struct User {
    password: String,
    tenants: Vec<TenantCandidate>,
}

type Listing = Result<Vec<Value>, String>;

struct MockState {
    users: HashMap<String, User>,
    tenant_lookup_error: Option<String>,
    sale_error: Option<String>,
    purchase_error: Option<String>,
    invoices: Listing,
    bills: Listing,
    banks: Listing,
    customers: Vec<Value>,
    items: Vec<Value>,
    vendors: Vec<Value>,
    document_link: Option<String>,
    execute_response: ApiResponse,
    session_expired: bool,
    issued_tokens: usize,
    context: CallContext,
    calls: Vec<MockCall>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            users: HashMap::new(),
            tenant_lookup_error: None,
            sale_error: None,
            purchase_error: None,
            invoices: Ok(Vec::new()),
            bills: Ok(Vec::new()),
            banks: Ok(Vec::new()),
            customers: Vec::new(),
            items: Vec::new(),
            vendors: Vec::new(),
            document_link: None,
            execute_response: ApiResponse::ok(Value::Null),
            session_expired: false,
            issued_tokens: 0,
            context: CallContext::default(),
            calls: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct MockErp {
    state: Mutex<MockState>,
}

impl MockErp {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: MockCall) {
        self.state().calls.push(call);
    }

    /// Reject the call the way the backend answers a stale token: drop the
    /// token from the context and fail with `Unauthorized`.
    fn check_session(&self) -> Result<(), ErpError> {
        let mut state = self.state();
        if state.session_expired {
            state.context.token = None;
            return Err(ErpError::Unauthorized("Current user did not login".to_string()));
        }
        Ok(())
    }

    /// Register a user. Authentication with a tenant name only succeeds for
    /// one of `tenants` (matched by name or id, case-insensitive).
    pub fn with_user(self, email: &str, password: &str, tenants: Vec<TenantCandidate>) -> Self {
        self.state().users.insert(
            email.to_lowercase(),
            User {
                password: password.to_string(),
                tenants,
            },
        );
        self
    }

    pub fn with_tenant_lookup_error(self, message: &str) -> Self {
        self.state().tenant_lookup_error = Some(message.to_string());
        self
    }

    pub fn with_sale_error(self, message: &str) -> Self {
        self.state().sale_error = Some(message.to_string());
        self
    }

    pub fn with_purchase_error(self, message: &str) -> Self {
        self.state().purchase_error = Some(message.to_string());
        self
    }

    pub fn with_invoices(self, rows: Vec<Value>) -> Self {
        self.state().invoices = Ok(rows);
        self
    }

    pub fn with_bills(self, rows: Vec<Value>) -> Self {
        self.state().bills = Ok(rows);
        self
    }

    pub fn with_banks(self, rows: Vec<Value>) -> Self {
        self.state().banks = Ok(rows);
        self
    }

    pub fn with_invoices_error(self, message: &str) -> Self {
        self.state().invoices = Err(message.to_string());
        self
    }

    pub fn with_bills_error(self, message: &str) -> Self {
        self.state().bills = Err(message.to_string());
        self
    }

    pub fn with_banks_error(self, message: &str) -> Self {
        self.state().banks = Err(message.to_string());
        self
    }

    pub fn with_customers(self, rows: Vec<Value>) -> Self {
        self.state().customers = rows;
        self
    }

    pub fn with_items(self, rows: Vec<Value>) -> Self {
        self.state().items = rows;
        self
    }

    pub fn with_vendors(self, rows: Vec<Value>) -> Self {
        self.state().vendors = rows;
        self
    }

    pub fn with_document_link(self, link: &str) -> Self {
        self.state().document_link = Some(link.to_string());
        self
    }

    pub fn with_execute_response(self, response: ApiResponse) -> Self {
        self.state().execute_response = response;
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Make every bookkeeping and reporting call fail as unauthorized.
    pub fn with_expired_session(self) -> Self {
        self.state().session_expired = true;
        self
    }
}

fn listing(rows: &Listing) -> Result<Vec<Value>, ErpError> {
    rows.clone().map_err(ErpError::Api)
}

#[async_trait]
impl AuthService for MockErp {
    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
        tenant_name: Option<&str>,
    ) -> Result<AccessToken, ErpError> {
        self.record(MockCall::Authenticate {
            email: email.to_string(),
            tenant: tenant_name.map(str::to_string),
        });

        let mut state = self.state();
        let user = state
            .users
            .get(&email.to_lowercase())
            .filter(|u| u.password == *password.expose_secret())
            .ok_or_else(|| ErpError::Api("Invalid user name or password".to_string()))?;

        if let Some(tenant) = tenant_name {
            let known = user.tenants.iter().any(|t| {
                t.tenancy_name.eq_ignore_ascii_case(tenant)
                    || t.tenant_id.eq_ignore_ascii_case(tenant)
            });
            if !known {
                return Err(ErpError::Api(format!(
                    "There is no tenant defined with name {}",
                    tenant
                )));
            }
        }

        state.issued_tokens += 1;
        Ok(AccessToken::new(format!("mock-token-{}", state.issued_tokens)))
    }

    async fn lookup_tenants(&self, email: &str) -> Result<Vec<TenantCandidate>, ErpError> {
        self.record(MockCall::LookupTenants {
            email: email.to_string(),
        });
        let mut state = self.state();
        if state.session_expired && state.context.token.take().is_some() {
            return Err(ErpError::Unauthorized("Current user did not login".to_string()));
        }
        if let Some(message) = &state.tenant_lookup_error {
            return Err(ErpError::Transport(message.clone()));
        }
        Ok(state
            .users
            .get(&email.trim().to_lowercase())
            .map(|u| u.tenants.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl BookkeepingService for MockErp {
    async fn record_sale(&self, details: &SaleDetails) -> Result<RecordReceipt, ErpError> {
        self.record(MockCall::RecordSale(details.clone()));
        self.check_session()?;
        let state = self.state();
        if let Some(message) = &state.sale_error {
            return Err(ErpError::Api(message.clone()));
        }
        let n = state.calls.len();
        Ok(RecordReceipt {
            document_number: Some(format!("INV-{}", n)),
            voucher_number: Some(format!("SV-{}", n)),
        })
    }

    async fn record_purchase(&self, details: &PurchaseDetails) -> Result<RecordReceipt, ErpError> {
        self.record(MockCall::RecordPurchase(details.clone()));
        self.check_session()?;
        let state = self.state();
        if let Some(message) = &state.purchase_error {
            return Err(ErpError::Api(message.clone()));
        }
        let n = state.calls.len();
        Ok(RecordReceipt {
            document_number: Some(format!("BILL-{}", n)),
            voucher_number: Some(format!("PV-{}", n)),
        })
    }
}

#[async_trait]
impl ReportingService for MockErp {
    async fn balance_sheet(&self, _as_of: DateTime<Utc>) -> Result<ReportDocument, ErpError> {
        self.record(MockCall::BalanceSheet);
        self.check_session()?;
        Ok(ReportDocument {
            link: self.state().document_link.clone(),
        })
    }

    async fn profit_and_loss(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ReportDocument, ErpError> {
        self.record(MockCall::ProfitAndLoss { from, to });
        self.check_session()?;
        Ok(ReportDocument {
            link: self.state().document_link.clone(),
        })
    }

    async fn account_ledger(
        &self,
        account: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<ReportDocument, ErpError> {
        self.record(MockCall::AccountLedger {
            account: account.to_string(),
        });
        self.check_session()?;
        Ok(ReportDocument {
            link: self.state().document_link.clone(),
        })
    }

    async fn invoices(&self) -> Result<Vec<Value>, ErpError> {
        self.record(MockCall::Invoices);
        self.check_session()?;
        listing(&self.state().invoices)
    }

    async fn bills(&self) -> Result<Vec<Value>, ErpError> {
        self.record(MockCall::Bills);
        self.check_session()?;
        listing(&self.state().bills)
    }

    async fn banks(&self) -> Result<Vec<Value>, ErpError> {
        self.record(MockCall::Banks);
        self.check_session()?;
        listing(&self.state().banks)
    }

    async fn customers(&self, query: Option<&str>) -> Result<Vec<Value>, ErpError> {
        self.record(MockCall::Customers {
            query: query.map(str::to_string),
        });
        self.check_session()?;
        let rows = self.state().customers.clone();
        let Some(query) = query.map(str::to_lowercase).filter(|q| !q.is_empty()) else {
            return Ok(rows);
        };
        Ok(rows
            .into_iter()
            .filter(|row| {
                row.get("customerTitle")
                    .and_then(Value::as_str)
                    .is_some_and(|title| title.to_lowercase().contains(&query))
            })
            .collect())
    }

    async fn items(&self, _query: Option<&str>) -> Result<Vec<Value>, ErpError> {
        self.record(MockCall::Items);
        self.check_session()?;
        Ok(self.state().items.clone())
    }

    async fn vendors(&self, _query: Option<&str>) -> Result<Vec<Value>, ErpError> {
        self.record(MockCall::Vendors);
        self.check_session()?;
        Ok(self.state().vendors.clone())
    }
}

#[async_trait]
impl ErpBackend for MockErp {
    fn set_context(&self, context: CallContext) {
        self.state().context = context;
    }

    fn context(&self) -> CallContext {
        self.state().context.clone()
    }

    async fn execute(&self, request: ApiRequest) -> ApiResponse {
        self.record(MockCall::Execute(request));
        self.state().execute_response.clone()
    }
}

// =============================================================================
// Responder
// =============================================================================

/// [`Responder`] that replays canned replies, then fails.
#[derive(Default)]
pub struct ScriptedResponder {
    replies: Mutex<VecDeque<String>>,
    transcripts: Mutex<Vec<Vec<ChatTurn>>>,
}

impl ScriptedResponder {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    /// Transcripts received so far.
    pub fn transcripts(&self) -> Vec<Vec<ChatTurn>> {
        self.transcripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    async fn respond(&self, transcript: &[ChatTurn]) -> Result<String, ErpError> {
        self.transcripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(transcript.to_vec());
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| ErpError::Responder("no scripted reply left".to_string()))
    }
}
