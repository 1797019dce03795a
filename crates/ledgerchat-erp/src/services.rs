//! Service traits the chat layer talks to, and their data types.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::Value;

use ledgerchat_core::types::TenantCandidate;

use crate::error::ErpError;
use crate::transport::{ApiRequest, ApiResponse, CallContext};

pub const WALK_IN_CUSTOMER: &str = "Walk-in Customer";
pub const GENERAL_ITEM: &str = "General Item";
pub const GENERAL_SUPPLIER: &str = "General Supplier";
pub const GENERAL_EXPENSE: &str = "General Expense";
pub const DEFAULT_QUANTITY: &str = "1";
pub const DEFAULT_AMOUNT: &str = "0";

// =============================================================================
// Data types
// =============================================================================

/// Bearer token issued by the ERP on successful authentication.
#[derive(Clone)]
pub struct AccessToken {
    pub token: SecretString,
    pub expires_in_seconds: Option<i64>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
            expires_in_seconds: None,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_in_seconds", &self.expires_in_seconds)
            .finish()
    }
}

/// Single-line sale invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleDetails {
    pub customer_title: String,
    pub item_title: String,
    pub unit_price: String,
    pub quantity: String,
}

impl SaleDetails {
    /// Placeholder walk-in sale; a missing amount becomes `"0"`.
    pub fn walk_in(amount: Option<&str>) -> Self {
        Self {
            customer_title: WALK_IN_CUSTOMER.to_string(),
            item_title: GENERAL_ITEM.to_string(),
            unit_price: amount.unwrap_or(DEFAULT_AMOUNT).to_string(),
            quantity: DEFAULT_QUANTITY.to_string(),
        }
    }
}

/// Single-line purchase bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseDetails {
    pub vendor_title: String,
    pub item_title: String,
    pub unit_price: String,
    pub quantity: String,
}

impl PurchaseDetails {
    /// Placeholder general expense; a missing amount becomes `"0"`.
    pub fn general_expense(amount: Option<&str>) -> Self {
        Self {
            vendor_title: GENERAL_SUPPLIER.to_string(),
            item_title: GENERAL_EXPENSE.to_string(),
            unit_price: amount.unwrap_or(DEFAULT_AMOUNT).to_string(),
            quantity: DEFAULT_QUANTITY.to_string(),
        }
    }
}

/// Identifiers of a recorded invoice or bill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordReceipt {
    /// Invoice or bill number.
    pub document_number: Option<String>,
    pub voucher_number: Option<String>,
}

/// A generated report. The link may be relative to the document host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportDocument {
    pub link: Option<String>,
}

// =============================================================================
// Service traits
// =============================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
        tenant_name: Option<&str>,
    ) -> Result<AccessToken, ErpError>;

    async fn lookup_tenants(&self, email: &str) -> Result<Vec<TenantCandidate>, ErpError>;
}

#[async_trait]
pub trait BookkeepingService: Send + Sync {
    async fn record_sale(&self, details: &SaleDetails) -> Result<RecordReceipt, ErpError>;
    async fn record_purchase(&self, details: &PurchaseDetails)
        -> Result<RecordReceipt, ErpError>;
}

#[async_trait]
pub trait ReportingService: Send + Sync {
    async fn balance_sheet(&self, as_of: DateTime<Utc>) -> Result<ReportDocument, ErpError>;

    async fn profit_and_loss(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ReportDocument, ErpError>;

    async fn account_ledger(
        &self,
        account: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ReportDocument, ErpError>;

    async fn invoices(&self) -> Result<Vec<Value>, ErpError>;
    async fn bills(&self) -> Result<Vec<Value>, ErpError>;
    async fn banks(&self) -> Result<Vec<Value>, ErpError>;
    async fn customers(&self, query: Option<&str>) -> Result<Vec<Value>, ErpError>;
    async fn items(&self, query: Option<&str>) -> Result<Vec<Value>, ErpError>;
    async fn vendors(&self, query: Option<&str>) -> Result<Vec<Value>, ErpError>;
}

/// Everything the chat layer needs from the ERP, behind one object.
#[async_trait]
pub trait ErpBackend: AuthService + BookkeepingService + ReportingService {
    fn set_context(&self, context: CallContext);

    fn context(&self) -> CallContext;

    /// Run a raw request. Callers validate the request first.
    async fn execute(&self, request: ApiRequest) -> ApiResponse;
}

/// Listing rows out of a result value: a bare array, or an object holding
/// the array under `items` or `result`.
pub fn list_rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Object(mut map) => ["items", "result"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(inner @ (Value::Array(_) | Value::Object(_))) => Some(list_rows(inner)),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Render a JSON scalar as text; strings stay unquoted.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
