//! Parameter extraction helpers.
//!
//! Matching decisions use the lower-cased text, but credential values are
//! pulled from the original input so their casing survives.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{DateTime, Months, Utc};
use regex::Regex;

use crate::types::{DateRange, LoginParams};

// =============================================================================
// Compiled patterns
// =============================================================================

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("Invalid email regex")
});

static EXPLICIT_PASSWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)password\s+([a-zA-Z0-9!@#$%^&*()_+]{3,})")
        .expect("Invalid explicit password regex")
});

static CONNECTIVE_PASSWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:is|and|with)\s+([a-zA-Z0-9!@#$%^&*()_+]{3,})")
        .expect("Invalid connective password regex")
});

static TENANT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)tenant\s+([a-zA-Z0-9]+)").expect("Invalid tenant regex"));

static AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("Invalid amount regex"));

static PIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpin\b:?\s*([a-zA-Z0-9]+)").expect("Invalid pin regex"));

static LEDGER_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ledger|account history|statement for").expect("Invalid ledger regex")
});

static SEARCH_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:search|find|look\s+up|customers?|for)\b").expect("Invalid search regex")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+").expect("Invalid token regex"));

/// Words the connective password marker must not capture.
const RESERVED_WORDS: &[&str] = &["email", "password", "tenant", "login", "sign"];

/// Phrase that asks for an explicit six-month window.
const LAST_SIX_MONTHS: &str = "last 6 months";

// =============================================================================
// Login
// =============================================================================

/// Extract email, password and tenant from a login request.
///
/// Password precedence: `password <token>`, then `is|and|with <token>`
/// (skipping reserved words and anything inside the email), then the token
/// right after the email unless it mentions a tenant.
pub fn login_params(input: &str) -> LoginParams {
    let email = EMAIL_RE.find(input).map(|m| m.as_str().to_string());

    let tenant_id = TENANT_RE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    LoginParams {
        email,
        password: password_span(input).map(|span| input[span].to_string()),
        tenant_id,
    }
}

/// Byte range of the login password in `input`, using the same precedence
/// as [`login_params`].
pub fn password_span(input: &str) -> Option<Range<usize>> {
    let email_span = EMAIL_RE.find(input).map(|m| m.range());

    explicit_password(input)
        .or_else(|| connective_password(input, email_span.clone()))
        .or_else(|| email_span.and_then(|span| positional_password(input, span)))
}

fn explicit_password(input: &str) -> Option<Range<usize>> {
    EXPLICIT_PASSWORD_RE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.range())
}

fn connective_password(input: &str, email_span: Option<Range<usize>>) -> Option<Range<usize>> {
    let mut pos = 0;
    while let Some(caps) = CONNECTIVE_PASSWORD_RE.captures_at(input, pos) {
        let whole = caps.get(0)?;
        let token = caps.get(1)?;

        let lower = token.as_str().to_lowercase();
        let reserved = RESERVED_WORDS.iter().any(|w| lower.starts_with(w));
        let inside_email = email_span
            .as_ref()
            .is_some_and(|span| token.start() < span.end && span.start < token.end());

        if !reserved && !inside_email {
            return Some(token.range());
        }

        // Retry one character further on, the way a rejected lookahead would.
        let step = input[whole.start()..].chars().next().map_or(1, char::len_utf8);
        pos = whole.start() + step;
    }
    None
}

/// The whitespace-separated token following the one holding the email.
fn positional_password(input: &str, email_span: Range<usize>) -> Option<Range<usize>> {
    let mut tokens = TOKEN_RE
        .find_iter(input)
        .skip_while(|t| t.end() < email_span.end);
    tokens.next()?;
    let next = tokens.next()?;
    if next.as_str().to_lowercase().contains("tenant") {
        None
    } else {
        Some(next.range())
    }
}

// =============================================================================
// Other parameters
// =============================================================================

/// First decimal-or-integer numeral in the text.
pub fn amount(lower: &str) -> Option<String> {
    AMOUNT_RE.find(lower).map(|m| m.as_str().to_string())
}

/// Optional PIN from a `pin <token>` / `pin: <token>` marker.
pub fn pin(input: &str) -> Option<String> {
    PIN_RE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Explicit `{from, to}` range when the text asks for the last six months.
pub fn report_range(lower: &str, now: DateTime<Utc>) -> Option<DateRange> {
    lower.contains(LAST_SIX_MONTHS).then(|| six_months_ending(now))
}

/// The window `now - 6 months ..= now`.
pub fn six_months_ending(now: DateTime<Utc>) -> DateRange {
    let from = now.checked_sub_months(Months::new(6)).unwrap_or(now);
    DateRange { from, to: now }
}

/// Account text left over once ledger trigger phrases are removed.
pub fn ledger_account(lower: &str) -> String {
    collapse(&LEDGER_NOISE_RE.replace_all(lower, " "))
}

/// Customer search query left over once search keywords are removed.
pub fn customer_query(lower: &str) -> String {
    collapse(&SEARCH_NOISE_RE.replace_all(lower, " "))
}

fn collapse(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}
