//! Structured action directives embedded in responder replies.
//!
//! A directive is untrusted. [`interpret`] only extracts it; [`validate`]
//! decides whether it may run.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use ledgerchat_erp::endpoints;
use ledgerchat_erp::{ApiRequest, Method};

use crate::error::ChatError;

pub const EXECUTE_API: &str = "EXECUTE_API";

static FENCED_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\n(.*?)\n```").expect("Invalid fenced json regex"));
static BARE_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("Invalid bare object regex"));
static FENCED_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json.*```").expect("Invalid fenced block regex"));

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directive {
    pub action: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub success_message: Option<String>,
}

/// What a responder reply turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponderReply {
    Text(String),
    Directive(Directive),
}

/// Split a responder reply into plain text or an executable directive.
///
/// Unparseable JSON leaves the reply as text. A JSON block that is not an
/// `EXECUTE_API` action is stripped and the surrounding text kept.
pub fn interpret(reply: &str) -> ResponderReply {
    let raw = FENCED_JSON_RE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .or_else(|| BARE_OBJECT_RE.find(reply));

    let Some(raw) = raw else {
        return ResponderReply::Text(reply.to_string());
    };

    let directive: Directive = match serde_json::from_str(raw.as_str()) {
        Ok(d) => d,
        Err(_) => return ResponderReply::Text(reply.to_string()),
    };

    let has_endpoint = directive
        .endpoint
        .as_deref()
        .is_some_and(|e| !e.trim().is_empty());
    if directive.action == EXECUTE_API && has_endpoint {
        return ResponderReply::Directive(directive);
    }

    let stripped = FENCED_BLOCK_RE.replace(reply, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        ResponderReply::Text(reply.to_string())
    } else {
        ResponderReply::Text(stripped.to_string())
    }
}

/// Turn a directive into a request, or refuse it.
///
/// The endpoint must be on the allow-list, the method must be GET or POST
/// (POST when absent) and the session must hold a token.
pub fn validate(directive: &Directive, authenticated: bool) -> Result<ApiRequest, ChatError> {
    if !authenticated {
        return Err(ChatError::DirectiveRejected("sign-in required".to_string()));
    }

    let endpoint = directive.endpoint.as_deref().unwrap_or_default().trim();
    let (path, query) = endpoints::split_endpoint(endpoint)
        .filter(|(path, _)| endpoints::is_allowed(path))
        .ok_or_else(|| {
            ChatError::DirectiveRejected(format!("endpoint {} is not permitted", endpoint))
        })?;

    let method = match directive.method.as_deref() {
        None => Method::Post,
        Some(m) => Method::parse(m)
            .ok_or_else(|| ChatError::DirectiveRejected(format!("unknown method {}", m)))?,
    };

    let mut request = match method {
        Method::Get => ApiRequest::get(path),
        Method::Post => ApiRequest::post(
            path,
            directive
                .body
                .clone()
                .unwrap_or_else(|| Value::Object(Default::default())),
        ),
        other => {
            return Err(ChatError::DirectiveRejected(format!(
                "method {} is not permitted",
                other
            )))
        }
    };

    for (key, value) in query {
        request = request.with_query(&key, value);
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn directive(endpoint: &str, method: Option<&str>) -> Directive {
        Directive {
            action: EXECUTE_API.to_string(),
            endpoint: Some(endpoint.to_string()),
            method: method.map(str::to_string),
            body: Some(json!({"customerTitle": "Acme"})),
            success_message: Some("Customer created.".to_string()),
        }
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(
            interpret("Debits go on the left."),
            ResponderReply::Text("Debits go on the left.".into())
        );
    }

    #[test]
    fn test_fenced_directive_is_extracted() {
        let reply = "Sure.\n```json\n{\"action\": \"EXECUTE_API\", \"endpoint\": \"/api/services/app/Customer/CreateCustomerInfo\", \"method\": \"POST\", \"body\": {\"customerTitle\": \"Acme\"}, \"successMessage\": \"Created Acme.\"}\n```";
        match interpret(reply) {
            ResponderReply::Directive(d) => {
                assert_eq!(
                    d.endpoint.as_deref(),
                    Some("/api/services/app/Customer/CreateCustomerInfo")
                );
                assert_eq!(d.success_message.as_deref(), Some("Created Acme."));
                assert_eq!(d.body.unwrap()["customerTitle"], "Acme");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bare_object_directive_is_extracted() {
        let reply = r#"{"action":"EXECUTE_API","endpoint":"/api/services/app/Item/GetItemsTitleResponse","method":"GET"}"#;
        assert!(matches!(interpret(reply), ResponderReply::Directive(_)));
    }

    #[test]
    fn test_malformed_json_shows_original_text() {
        let reply = "Here you go {not json at all}";
        assert_eq!(interpret(reply), ResponderReply::Text(reply.into()));
    }

    #[test]
    fn test_other_action_strips_block() {
        let reply = "Noted.\n```json\n{\"action\": \"NOTE\"}\n```";
        assert_eq!(interpret(reply), ResponderReply::Text("Noted.".into()));
    }

    #[test]
    fn test_validate_post_directive() {
        let request = validate(
            &directive("/api/services/app/Customer/CreateCustomerInfo", None),
            true,
        )
        .unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body.unwrap()["customerTitle"], "Acme");
    }

    #[test]
    fn test_validate_get_splits_query() {
        let request = validate(
            &directive(
                "/api/services/app/Customer/GetCustomersTitleResponse?filter=acme",
                Some("get"),
            ),
            true,
        )
        .unwrap();
        assert_eq!(request.method, Method::Get);
        assert_eq!(
            request.endpoint,
            "/api/services/app/Customer/GetCustomersTitleResponse"
        );
        assert_eq!(request.query_value("filter"), Some("acme"));
        assert!(request.body.is_none());
    }

    #[test]
    fn test_validate_decodes_encoded_query_values() {
        let request = validate(
            &directive(
                "/api/services/app/Customer/GetCustomersTitleResponse?filter=acme%20corp&x=a+b",
                Some("GET"),
            ),
            true,
        )
        .unwrap();
        assert_eq!(request.endpoint, endpoints::CUSTOMERS);
        assert_eq!(request.query_value("filter"), Some("acme corp"));
        assert_eq!(request.query_value("x"), Some("a b"));
    }

    #[test]
    fn test_validate_rejects_other_hosts() {
        let err = validate(
            &directive(
                "https://evil.example/api/services/app/Item/GetItemsTitleResponse",
                Some("GET"),
            ),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, ChatError::DirectiveRejected(_)));
    }

    #[test]
    fn test_validate_requires_token() {
        let err = validate(&directive(endpoints::CUSTOMERS, Some("GET")), false).unwrap_err();
        assert!(matches!(err, ChatError::DirectiveRejected(_)));
    }

    #[test]
    fn test_validate_rejects_unlisted_endpoint() {
        assert!(validate(&directive("/api/services/app/User/DeleteUser", None), true).is_err());
        assert!(validate(&directive(endpoints::AUTHENTICATE, None), true).is_err());
    }

    #[test]
    fn test_validate_rejects_destructive_methods() {
        assert!(validate(&directive(endpoints::CUSTOMERS, Some("DELETE")), true).is_err());
        assert!(validate(&directive(endpoints::CUSTOMERS, Some("PUT")), true).is_err());
        assert!(validate(&directive(endpoints::CUSTOMERS, Some("PATCH")), true).is_err());
    }
}
