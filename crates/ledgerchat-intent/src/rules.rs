//! Ordered classification rules.
//!
//! Keyword families overlap ("show invoices" mentions a sale keyword,
//! "add customer" mentions a list keyword), so each rule carries its own
//! guards and the table is evaluated top to bottom. Matching is plain
//! substring search over the lower-cased text.

use crate::types::IntentKind;

/// One row of the classification table.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub kind: IntentKind,
    /// At least one of these must occur.
    pub triggers: &'static [&'static str],
    /// When non-empty, at least one of these must also occur.
    pub requires_any: &'static [&'static str],
    /// None of these may occur.
    pub excluded_by: &'static [&'static str],
}

const CREATION_VERBS: &[&str] = &["create", "add", "new"];
const READ_VERBS: &[&str] = &["show", "list", "get"];

/// The classification table, highest priority first.
pub const RULES: &[Rule] = &[
    Rule {
        kind: IntentKind::Login,
        triggers: &["login", "sign in", "authenticate"],
        requires_any: &[],
        excluded_by: &[],
    },
    Rule {
        kind: IntentKind::Help,
        triggers: &["help", "how to", "microphone", "what can you do"],
        requires_any: &[],
        excluded_by: &[],
    },
    Rule {
        kind: IntentKind::GetLedger,
        triggers: &["ledger", "statement for"],
        requires_any: &[],
        excluded_by: &[],
    },
    Rule {
        kind: IntentKind::SearchCustomer,
        triggers: &["customer"],
        requires_any: &["search", "find", "look up"],
        excluded_by: &[],
    },
    Rule {
        kind: IntentKind::ListCustomers,
        triggers: &["customer", "client"],
        requires_any: &[],
        excluded_by: CREATION_VERBS,
    },
    Rule {
        kind: IntentKind::ListItems,
        triggers: &["item", "inventory", "stock"],
        requires_any: &[],
        excluded_by: CREATION_VERBS,
    },
    Rule {
        kind: IntentKind::ListVendors,
        triggers: &["vendor", "supplier"],
        requires_any: &[],
        excluded_by: CREATION_VERBS,
    },
    Rule {
        kind: IntentKind::GetReport,
        triggers: &["report", "balance sheet", "profit", "p&l", "pnl"],
        requires_any: &[],
        excluded_by: &[],
    },
    Rule {
        kind: IntentKind::RecordSale,
        triggers: &["sale", "invoice", "sold"],
        requires_any: &[],
        excluded_by: READ_VERBS,
    },
    Rule {
        kind: IntentKind::RecordPurchase,
        triggers: &["purchase", "bill", "bought"],
        requires_any: &[],
        excluded_by: READ_VERBS,
    },
    Rule {
        kind: IntentKind::SwitchTenant,
        triggers: &["switch", "change company", "select tenant", "pin"],
        requires_any: &[],
        excluded_by: &[],
    },
];

/// Profit-and-loss keywords within the report family.
pub const PNL_KEYWORDS: &[&str] = &["profit", "p&l", "pnl"];

impl Rule {
    /// Whether this rule accepts the already lower-cased text.
    pub fn matches(&self, lower: &str) -> bool {
        contains_any(lower, self.triggers)
            && (self.requires_any.is_empty() || contains_any(lower, self.requires_any))
            && !contains_any(lower, self.excluded_by)
    }
}

/// Classify lower-cased text against [`RULES`]. Falls back to `Unknown`.
pub fn classify(lower: &str) -> IntentKind {
    RULES
        .iter()
        .find(|rule| rule.matches(lower))
        .map(|rule| rule.kind)
        .unwrap_or(IntentKind::Unknown)
}

pub(crate) fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
