use chrono::{DateTime, Utc};

use crate::extract;
use crate::rules::{self, contains_any, PNL_KEYWORDS};
use crate::types::{
    AmountParams, Intent, IntentKind, LedgerParams, ReportParams, SearchParams,
    SwitchTenantParams,
};

/// Resolve a chat turn against the current clock.
pub fn resolve(text: &str) -> Intent {
    resolve_at(text, Utc::now())
}

/// Resolve a chat turn with an explicit clock.
///
/// Total: anything the rule table does not recognise is [`Intent::Unknown`].
pub fn resolve_at(text: &str, now: DateTime<Utc>) -> Intent {
    let lower = text.to_lowercase();
    let kind = rules::classify(&lower);

    let intent = match kind {
        IntentKind::Login => Intent::Login(extract::login_params(text)),
        IntentKind::Help => Intent::Help,
        IntentKind::GetLedger => Intent::GetLedger(LedgerParams {
            account: extract::ledger_account(&lower),
        }),
        IntentKind::SearchCustomer => Intent::SearchCustomer(SearchParams {
            query: extract::customer_query(&lower),
        }),
        IntentKind::ListCustomers => Intent::ListCustomers,
        IntentKind::ListItems => Intent::ListItems,
        IntentKind::ListVendors => Intent::ListVendors,
        IntentKind::GetReport => Intent::GetReport(ReportParams {
            is_pnl: contains_any(&lower, PNL_KEYWORDS),
            date_range: extract::report_range(&lower, now),
        }),
        IntentKind::RecordSale => Intent::RecordSale(AmountParams {
            amount: extract::amount(&lower),
        }),
        IntentKind::RecordPurchase => Intent::RecordPurchase(AmountParams {
            amount: extract::amount(&lower),
        }),
        IntentKind::SwitchTenant => Intent::SwitchTenant(SwitchTenantParams {
            pin: extract::pin(text),
        }),
        IntentKind::Unknown => Intent::Unknown,
    };

    tracing::debug!(intent = %intent.kind(), "Resolved chat turn");
    intent
}
