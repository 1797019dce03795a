//! ERP REST endpoint paths.

use reqwest::Url;

pub const AUTHENTICATE: &str = "/api/TokenAuth/Authenticate";
pub const LOGIN_TENANTS: &str = "/api/services/app/Account/GetLoginTenants";

pub const CREATE_INVOICE: &str = "/api/services/app/InvoiceInfo/CreateInventoryItemInvoice";
pub const CREATE_BILL: &str = "/api/services/app/BillingInfo/CreateInventoryItemBilling";

pub const INVOICE_LIST: &str = "/api/services/app/InvoiceInfo/GetInvoiceInfoList";
pub const BILL_LIST: &str = "/api/services/app/BillingInfo/GetBillingInfoList";
pub const BANK_LIST: &str = "/api/services/app/Bank/GetBankInfoList";
pub const BANK_ACCOUNTS: &str = "/api/services/app/BankAccount/GetBankAccounts";

pub const CUSTOMERS: &str = "/api/services/app/Customer/GetCustomersTitleResponse";
pub const CREATE_CUSTOMER: &str = "/api/services/app/Customer/CreateCustomerInfo";
pub const ITEMS: &str = "/api/services/app/Item/GetItemsTitleResponse";
pub const CREATE_ITEM: &str = "/api/services/app/Item/CreateInventoryItem";
pub const VENDORS: &str = "/api/services/app/Vendor/GetVendorsTitleResponse";

pub const VOUCHER_REPORT: &str = "/api/services/app/BookKeeping/GetVoucherReport";
pub const ACCOUNT_LEDGER: &str = "/api/Reports/AccountLedger";

/// Paths a responder directive may target.
pub const DIRECTIVE_ALLOW_LIST: &[&str] = &[
    CREATE_CUSTOMER,
    CREATE_ITEM,
    CUSTOMERS,
    ITEMS,
    VENDORS,
    BANK_ACCOUNTS,
    BANK_LIST,
    INVOICE_LIST,
    BILL_LIST,
    CREATE_INVOICE,
    CREATE_BILL,
    ACCOUNT_LEDGER,
    VOUCHER_REPORT,
];

/// Origin relative endpoints are resolved against when parsed.
const PARSE_BASE: &str = "http://erp.invalid/";

/// Split a relative endpoint into its path and percent-decoded query pairs.
///
/// `None` when the endpoint does not resolve to the backend's own origin,
/// e.g. an absolute URL to another host.
pub fn split_endpoint(endpoint: &str) -> Option<(String, Vec<(String, String)>)> {
    let base = Url::parse(PARSE_BASE).ok()?;
    let url = base.join(endpoint.trim()).ok()?;
    if url.origin() != base.origin() {
        return None;
    }
    let query = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    Some((url.path().to_string(), query))
}

/// Whether `endpoint` (query string ignored) is on the directive allow-list.
pub fn is_allowed(endpoint: &str) -> bool {
    split_endpoint(endpoint)
        .is_some_and(|(path, _)| DIRECTIVE_ALLOW_LIST.contains(&path.as_str()))
}
