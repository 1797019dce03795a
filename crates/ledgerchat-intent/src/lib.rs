//! Deterministic intent resolution for LedgerChat.
//!
//! Turns a free-text chat turn into one of a closed set of ERP intents,
//! extracting credentials, amounts, date ranges and tenant identifiers
//! along the way. Classification is an ordered, first-match-wins rule
//! table; see [`rules::RULES`].

pub mod extract;
pub mod resolver;
pub mod rules;
pub mod types;

pub use resolver::{resolve, resolve_at};
pub use rules::{Rule, RULES};
pub use types::{
    AmountParams, DateRange, Intent, IntentKind, LedgerParams, LoginParams, ReportParams,
    SearchParams, SwitchTenantParams,
};
