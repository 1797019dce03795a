//! Intent and parameter types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fieldless discriminant of [`Intent`], used by the rule table, logs, and
/// the interaction recall record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    Login,
    RecordSale,
    RecordPurchase,
    GetReport,
    GetLedger,
    ListCustomers,
    ListItems,
    ListVendors,
    SearchCustomer,
    SwitchTenant,
    Help,
    Unknown,
}

impl IntentKind {
    pub const ALL: [IntentKind; 12] = [
        IntentKind::Login,
        IntentKind::RecordSale,
        IntentKind::RecordPurchase,
        IntentKind::GetReport,
        IntentKind::GetLedger,
        IntentKind::ListCustomers,
        IntentKind::ListItems,
        IntentKind::ListVendors,
        IntentKind::SearchCustomer,
        IntentKind::SwitchTenant,
        IntentKind::Help,
        IntentKind::Unknown,
    ];

    /// Intents the dispatcher refuses to run without a session token.
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            IntentKind::RecordSale
                | IntentKind::RecordPurchase
                | IntentKind::GetReport
                | IntentKind::GetLedger
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Login => "LOGIN",
            IntentKind::RecordSale => "RECORD_SALE",
            IntentKind::RecordPurchase => "RECORD_PURCHASE",
            IntentKind::GetReport => "GET_REPORT",
            IntentKind::GetLedger => "GET_LEDGER",
            IntentKind::ListCustomers => "LIST_CUSTOMERS",
            IntentKind::ListItems => "LIST_ITEMS",
            IntentKind::ListVendors => "LIST_VENDORS",
            IntentKind::SearchCustomer => "SEARCH_CUSTOMER",
            IntentKind::SwitchTenant => "SWITCH_TENANT",
            IntentKind::Help => "HELP",
            IntentKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntentKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntentKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown intent kind: {}", s))
    }
}

// =============================================================================
// Params
// =============================================================================

/// Credentials pulled out of a login request. Every field is optional; a
/// partial login drops the conversation into the email/password dialogue.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginParams {
    pub email: Option<String>,
    pub password: Option<String>,
    pub tenant_id: Option<String>,
}

impl LoginParams {
    pub fn has_credentials(&self) -> bool {
        self.email.is_some() && self.password.is_some()
    }
}

impl fmt::Debug for LoginParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginParams")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountParams {
    /// First numeral in the text, kept in string form.
    pub amount: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    pub is_pnl: bool,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerParams {
    pub account: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchTenantParams {
    pub pin: Option<String>,
}

// =============================================================================
// Intent
// =============================================================================

/// A classified chat turn with its extracted parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Login(LoginParams),
    RecordSale(AmountParams),
    RecordPurchase(AmountParams),
    GetReport(ReportParams),
    GetLedger(LedgerParams),
    ListCustomers,
    ListItems,
    ListVendors,
    SearchCustomer(SearchParams),
    SwitchTenant(SwitchTenantParams),
    Help,
    Unknown,
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::Login(_) => IntentKind::Login,
            Intent::RecordSale(_) => IntentKind::RecordSale,
            Intent::RecordPurchase(_) => IntentKind::RecordPurchase,
            Intent::GetReport(_) => IntentKind::GetReport,
            Intent::GetLedger(_) => IntentKind::GetLedger,
            Intent::ListCustomers => IntentKind::ListCustomers,
            Intent::ListItems => IntentKind::ListItems,
            Intent::ListVendors => IntentKind::ListVendors,
            Intent::SearchCustomer(_) => IntentKind::SearchCustomer,
            Intent::SwitchTenant(_) => IntentKind::SwitchTenant,
            Intent::Help => IntentKind::Help,
            Intent::Unknown => IntentKind::Unknown,
        }
    }

    /// Copy of this intent safe to persist: login passwords are dropped.
    pub fn redacted(&self) -> Intent {
        match self {
            Intent::Login(params) => Intent::Login(LoginParams {
                password: None,
                ..params.clone()
            }),
            other => other.clone(),
        }
    }

    /// `input` with any extracted login password masked as `***`.
    pub fn scrub_input(&self, input: &str) -> String {
        match self {
            Intent::Login(LoginParams {
                password: Some(password),
                ..
            }) if !password.is_empty() => match crate::extract::password_span(input) {
                Some(span) if input[span.clone()] == **password => {
                    let mut scrubbed = input.to_string();
                    scrubbed.replace_range(span, "***");
                    scrubbed
                }
                _ => input
                    .split(' ')
                    .map(|word| if word == password { "***" } else { word })
                    .collect::<Vec<_>>()
                    .join(" "),
            },
            _ => input.to_string(),
        }
    }
}
