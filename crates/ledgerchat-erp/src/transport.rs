//! JSON request transport to the ERP REST API.
//!
//! The transport owns the call context (bearer token and tenant id) and
//! injects it into every request. It never returns `Err`: connectivity
//! failures, non-JSON bodies and error statuses all come back as an
//! [`ApiResponse`] with `success = false`.

use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ErpError;

pub const TENANT_HEADER: &str = "Abp-TenantId";

// =============================================================================
// Request / response
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Case-insensitive parse of an HTTP method name.
    pub fn parse(s: &str) -> Option<Method> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Path relative to the backend base URL.
    pub endpoint: String,
    pub method: Method,
    /// Query parameters, URL-encoded by the transport.
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: Method::Get,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: Method::Post,
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Value of the first query parameter named `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Normalised backend reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub success: bool,
    pub result: Value,
    pub error: Option<String>,
    /// Set when the backend answered 401/403.
    pub unauthorized: bool,
}

impl ApiResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result,
            error: None,
            unauthorized: false,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: Value::Null,
            error: Some(error.into()),
            unauthorized: false,
        }
    }

    /// Build a response from a JSON body.
    ///
    /// ABP envelopes (`{success, result, error}`) are unwrapped; any other
    /// JSON document is treated as the result itself.
    pub fn from_json(status_ok: bool, data: Value) -> Self {
        let unauthorized = data
            .get("unAuthorizedRequest")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if !status_ok {
            return Self {
                success: false,
                error: Some(error_message(&data)),
                result: data,
                unauthorized,
            };
        }

        match data.get("success").and_then(Value::as_bool) {
            Some(success) => Self {
                success,
                error: (!success).then(|| error_message(&data)),
                result: data.get("result").cloned().unwrap_or(Value::Null),
                unauthorized,
            },
            None => Self::ok(data),
        }
    }

    /// Convert into the result value, mapping failures onto [`ErpError`].
    pub fn into_result(self) -> Result<Value, ErpError> {
        if self.success {
            return Ok(self.result);
        }
        let message = self.error.unwrap_or_else(|| "Unknown error".to_string());
        if self.unauthorized {
            Err(ErpError::Unauthorized(message))
        } else {
            Err(ErpError::Api(message))
        }
    }
}

/// `error.message` (or top-level `message`) plus `error.details` when present.
fn error_message(data: &Value) -> String {
    let error = data.get("error");
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .or_else(|| data.get("message").and_then(Value::as_str))
        .or_else(|| error.and_then(Value::as_str))
        .unwrap_or("Error");
    match error
        .and_then(|e| e.get("details"))
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
    {
        Some(details) => format!("{}: {}", message, details),
        None => message.to_string(),
    }
}

// =============================================================================
// Call context
// =============================================================================

/// Credentials attached to outgoing requests.
#[derive(Clone, Default)]
pub struct CallContext {
    pub token: Option<SecretString>,
    pub tenant_id: Option<String>,
}

impl CallContext {
    pub fn new(token: Option<SecretString>, tenant_id: Option<String>) -> Self {
        Self { token, tenant_id }
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

// =============================================================================
// Transport
// =============================================================================

#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: ApiRequest) -> ApiResponse;

    /// Replace the credentials used for subsequent calls.
    fn set_context(&self, context: CallContext);

    fn context(&self) -> CallContext;
}

/// [`Transport`] over HTTP with `reqwest`.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    context: RwLock<CallContext>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ErpError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            context: RwLock::new(CallContext::default()),
        })
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if endpoint.starts_with('/') {
            format!("{}{}", base, endpoint)
        } else {
            format!("{}/{}", base, endpoint)
        }
    }

    fn drop_token(&self) {
        let mut context = self.context.write().unwrap_or_else(|e| e.into_inner());
        context.token = None;
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: ApiRequest) -> ApiResponse {
        let context = self.context();
        let url = self.url_for(&request.endpoint);
        debug!(method = %request.method, endpoint = %request.endpoint, "ERP request");

        let mut builder = self.client.request(request.method.to_reqwest(), &url);
        if let Some(token) = &context.token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(tenant_id) = &context.tenant_id {
            builder = builder.header(TENANT_HEADER, tenant_id.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint = %request.endpoint, "ERP request failed: {}", e);
                return ApiResponse::failure(format!("Connectivity Error: {}", e));
            }
        };

        let status = response.status();
        let unauthorized = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN);
        if unauthorized {
            warn!(status = status.as_u16(), "ERP rejected credentials, dropping token");
            self.drop_token();
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));

        let mut api_response = if is_json {
            match response.json::<Value>().await {
                Ok(data) => ApiResponse::from_json(status.is_success(), data),
                Err(e) => ApiResponse::failure(format!("Invalid JSON from backend: {}", e)),
            }
        } else {
            let text = response.text().await.unwrap_or_default();
            ApiResponse {
                success: status.is_success(),
                result: Value::String(text),
                error: (!status.is_success())
                    .then(|| format!("API Error: {}", status.as_u16())),
                unauthorized: false,
            }
        };
        api_response.unauthorized |= unauthorized;
        api_response
    }

    fn set_context(&self, context: CallContext) {
        let mut current = self.context.write().unwrap_or_else(|e| e.into_inner());
        *current = context;
    }

    fn context(&self) -> CallContext {
        self.context
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
