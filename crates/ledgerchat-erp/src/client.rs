//! ERP service implementations over a [`Transport`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{info, warn};

use ledgerchat_core::types::TenantCandidate;

use crate::endpoints;
use crate::error::ErpError;
use crate::services::{
    list_rows, value_text, AccessToken, AuthService, BookkeepingService, ErpBackend,
    PurchaseDetails, RecordReceipt, ReportDocument, ReportingService, SaleDetails,
};
use crate::transport::{ApiRequest, ApiResponse, CallContext, Transport};

const BALANCE_SHEET: &str = "BalanceSheet";
const PROFIT_AND_LOSS: &str = "ProfitAndLoss";

/// ABP-style ERP client.
pub struct ErpClient<T: Transport> {
    transport: T,
}

impl<T: Transport> ErpClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn fetch(&self, request: ApiRequest) -> Result<Value, ErpError> {
        self.transport.call(request).await.into_result()
    }

    async fn fetch_rows(&self, request: ApiRequest) -> Result<Vec<Value>, ErpError> {
        Ok(list_rows(self.fetch(request).await?))
    }

    async fn fetch_document(&self, request: ApiRequest) -> Result<ReportDocument, ErpError> {
        let result = self.fetch(request).await?;
        let link = result
            .get("pdfLink")
            .and_then(Value::as_str)
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        Ok(ReportDocument { link })
    }
}

fn with_filter(request: ApiRequest, query: Option<&str>) -> ApiRequest {
    match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => request.with_query("filter", q),
        None => request,
    }
}

fn receipt(result: &Value, number_field: &str) -> RecordReceipt {
    RecordReceipt {
        document_number: result.get(number_field).and_then(value_text),
        voucher_number: result.get("voucherNumber").and_then(value_text),
    }
}

#[async_trait]
impl<T: Transport> AuthService for ErpClient<T> {
    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
        tenant_name: Option<&str>,
    ) -> Result<AccessToken, ErpError> {
        let mut body = json!({
            "userNameOrEmailAddress": email,
            "password": password.expose_secret(),
            "rememberClient": true,
        });
        if let Some(tenant) = tenant_name {
            body["tenancyName"] = Value::String(tenant.to_string());
        }

        let result = self
            .fetch(ApiRequest::post(endpoints::AUTHENTICATE, body))
            .await?;

        let token = result
            .get("accessToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ErpError::Decode("response carried no accessToken".to_string()))?;

        info!(tenant = tenant_name.unwrap_or("host"), "Authenticated against ERP");
        Ok(AccessToken {
            token: SecretString::new(token.to_string()),
            expires_in_seconds: result.get("expireInSeconds").and_then(Value::as_i64),
        })
    }

    async fn lookup_tenants(&self, email: &str) -> Result<Vec<TenantCandidate>, ErpError> {
        let request = ApiRequest::get(endpoints::LOGIN_TENANTS).with_query("emailAddress", email);
        let rows = self.fetch_rows(request).await?;

        let tenants = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<TenantCandidate>(row) {
                Ok(tenant) => Some(tenant),
                Err(e) => {
                    warn!("Skipping malformed tenant row: {}", e);
                    None
                }
            })
            .collect();
        Ok(tenants)
    }
}

#[async_trait]
impl<T: Transport> BookkeepingService for ErpClient<T> {
    async fn record_sale(&self, details: &SaleDetails) -> Result<RecordReceipt, ErpError> {
        let body = json!({
            "customerTitle": details.customer_title,
            "invoiceInfoDetails": [{
                "itemTitle": details.item_title,
                "unitPrice": details.unit_price,
                "quantity": details.quantity,
            }],
        });
        let result = self
            .fetch(ApiRequest::post(endpoints::CREATE_INVOICE, body))
            .await?;
        Ok(receipt(&result, "invoiceNo"))
    }

    async fn record_purchase(&self, details: &PurchaseDetails) -> Result<RecordReceipt, ErpError> {
        let body = json!({
            "vendorTitle": details.vendor_title,
            "billingInfoDetails": [{
                "itemTitle": details.item_title,
                "unitPrice": details.unit_price,
                "quantity": details.quantity,
            }],
        });
        let result = self
            .fetch(ApiRequest::post(endpoints::CREATE_BILL, body))
            .await?;
        Ok(receipt(&result, "billNo"))
    }
}

#[async_trait]
impl<T: Transport> ReportingService for ErpClient<T> {
    async fn balance_sheet(&self, as_of: DateTime<Utc>) -> Result<ReportDocument, ErpError> {
        self.fetch_document(
            ApiRequest::get(endpoints::VOUCHER_REPORT)
                .with_query("reportType", BALANCE_SHEET)
                .with_query("asOfDate", as_of.to_rfc3339()),
        )
        .await
    }

    async fn profit_and_loss(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ReportDocument, ErpError> {
        self.fetch_document(
            ApiRequest::get(endpoints::VOUCHER_REPORT)
                .with_query("reportType", PROFIT_AND_LOSS)
                .with_query("fromDate", from.to_rfc3339())
                .with_query("toDate", to.to_rfc3339()),
        )
        .await
    }

    async fn account_ledger(
        &self,
        account: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ReportDocument, ErpError> {
        let body = json!({
            "fromDate": from.format("%Y-%m-%d").to_string(),
            "toDate": to.format("%Y-%m-%d").to_string(),
            "accountTitle": account,
        });
        self.fetch_document(ApiRequest::post(endpoints::ACCOUNT_LEDGER, body))
            .await
    }

    async fn invoices(&self) -> Result<Vec<Value>, ErpError> {
        self.fetch_rows(ApiRequest::get(endpoints::INVOICE_LIST))
            .await
    }

    async fn bills(&self) -> Result<Vec<Value>, ErpError> {
        self.fetch_rows(ApiRequest::get(endpoints::BILL_LIST)).await
    }

    async fn banks(&self) -> Result<Vec<Value>, ErpError> {
        self.fetch_rows(ApiRequest::get(endpoints::BANK_LIST)).await
    }

    async fn customers(&self, query: Option<&str>) -> Result<Vec<Value>, ErpError> {
        self.fetch_rows(with_filter(ApiRequest::get(endpoints::CUSTOMERS), query))
            .await
    }

    async fn items(&self, query: Option<&str>) -> Result<Vec<Value>, ErpError> {
        self.fetch_rows(with_filter(ApiRequest::get(endpoints::ITEMS), query))
            .await
    }

    async fn vendors(&self, query: Option<&str>) -> Result<Vec<Value>, ErpError> {
        self.fetch_rows(with_filter(ApiRequest::get(endpoints::VENDORS), query))
            .await
    }
}

#[async_trait]
impl<T: Transport> ErpBackend for ErpClient<T> {
    fn set_context(&self, context: CallContext) {
        self.transport.set_context(context);
    }

    fn context(&self) -> CallContext {
        self.transport.context()
    }

    async fn execute(&self, request: ApiRequest) -> ApiResponse {
        self.transport.call(request).await
    }
}
