//! Live financial summary attached to report replies.
//!
//! Invoices, bills and bank balances are fetched concurrently. Each section
//! only depends on the figures it shows, so one failed listing degrades
//! its sections and leaves the rest intact.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use ledgerchat_erp::ErpBackend;

pub const FETCH_FAILED: &str = "Failed to fetch live data";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportLine {
    pub name: String,
    /// `None` when the figure could not be fetched.
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    pub category: String,
    pub lines: Vec<ReportLine>,
    pub total: Option<f64>,
}

/// Aggregated totals, each carrying its own fetch outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveFigures {
    pub sales: Result<f64, String>,
    pub purchases: Result<f64, String>,
    pub cash: Result<f64, String>,
}

pub async fn fetch_live_figures(backend: &dyn ErpBackend) -> LiveFigures {
    let (invoices, bills, banks) =
        tokio::join!(backend.invoices(), backend.bills(), backend.banks());

    let total = |name: &str, rows: Result<Vec<Value>, _>, field: &str| match rows {
        Ok(rows) => Ok(sum_field(&rows, field)),
        Err(e) => {
            warn!(source = name, "Live report figure unavailable: {}", e);
            Err(format!("{}", e))
        }
    };

    LiveFigures {
        sales: total("invoices", invoices, "netValue"),
        purchases: total("bills", bills, "netValue"),
        cash: total("banks", banks, "balance"),
    }
}

/// Sum of `field` across rows. Numeric strings count; anything else is 0.
pub fn sum_field(rows: &[Value], field: &str) -> f64 {
    rows.iter()
        .filter_map(|row| row.get(field))
        .map(|value| match value {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => s.trim().replace(',', "").parse().unwrap_or(0.0),
            _ => 0.0,
        })
        .sum()
}

/// Assets, Liabilities and Equity in that order.
pub fn build_sections(figures: &LiveFigures) -> Vec<ReportSection> {
    let assets = match (&figures.cash, &figures.sales) {
        (Ok(cash), Ok(sales)) => section(
            "Assets",
            vec![
                line("Cash and Bank Balance", *cash),
                line("Accounts Receivable (Sales)", *sales),
            ],
            cash + sales,
        ),
        _ => failed("Assets"),
    };

    let liabilities = match &figures.purchases {
        Ok(purchases) => section(
            "Liabilities",
            vec![line("Accounts Payable (Purchases)", *purchases)],
            *purchases,
        ),
        Err(_) => failed("Liabilities"),
    };

    let equity = match (&figures.sales, &figures.purchases) {
        (Ok(sales), Ok(purchases)) => {
            let net = sales - purchases;
            section(
                "Equity",
                vec![line("Current Period Retained Earnings", net)],
                net,
            )
        }
        _ => failed("Equity"),
    };

    vec![assets, liabilities, equity]
}

/// Absolute link for a report document. Relative links are joined to
/// `base`; a missing link renders as `#`.
pub fn resolve_document_link(link: Option<&str>, base: &str) -> String {
    match link.map(str::trim).filter(|l| !l.is_empty()) {
        None => "#".to_string(),
        Some(link) if link.starts_with("http") => link.to_string(),
        Some(link) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            link.trim_start_matches('/')
        ),
    }
}

fn line(name: &str, amount: f64) -> ReportLine {
    ReportLine {
        name: name.to_string(),
        amount: Some(amount),
    }
}

fn section(category: &str, lines: Vec<ReportLine>, total: f64) -> ReportSection {
    ReportSection {
        category: category.to_string(),
        lines,
        total: Some(total),
    }
}

fn failed(category: &str) -> ReportSection {
    ReportSection {
        category: category.to_string(),
        lines: vec![ReportLine {
            name: FETCH_FAILED.to_string(),
            amount: None,
        }],
        total: None,
    }
}
