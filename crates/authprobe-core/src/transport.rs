//! Transport Client contract.
//!
//! A transport issues exactly one HTTP request and classifies what happened
//! into a [`NormalizedResponse`]. It never retries and never logs; both are
//! the caller's concern. The only `Err` it returns is for a request that
//! could not be issued at all (empty path, bad header).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::HttpMethod;
use crate::error::TransportError;

/// Header sent on every request unless the caller overrides it.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[("Content-Type", "application/json")];

/// One request against `{base_url}{path}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub base_url: String,
    pub path: String,
    pub method: HttpMethod,
    pub body: Option<Value>,
    /// Caller headers; they win over [`DEFAULT_HEADERS`] on a name collision.
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl ProbeRequest {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            method,
            body: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Full URL, or `InvalidRequest` when the call is malformed.
    pub fn url(&self) -> Result<String, TransportError> {
        if self.base_url.trim().is_empty() {
            return Err(TransportError::InvalidRequest(
                "base URL is empty".to_string(),
            ));
        }
        if self.path.is_empty() {
            return Err(TransportError::InvalidRequest("path is empty".to_string()));
        }
        if !self.path.starts_with('/') {
            return Err(TransportError::InvalidRequest(format!(
                "path '{}' must start with '/'",
                self.path
            )));
        }
        Ok(format!("{}{}", self.base_url.trim_end_matches('/'), self.path))
    }

    /// Defaults merged with caller headers; caller wins, compared
    /// case-insensitively. Order: surviving defaults first, then caller
    /// headers as given.
    pub fn merged_headers(&self) -> Vec<(String, String)> {
        merge_headers(DEFAULT_HEADERS, &self.headers)
    }
}

pub fn merge_headers(defaults: &[(&str, &str)], extra: &[(String, String)]) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = defaults
        .iter()
        .filter(|(name, _)| !extra.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)))
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect();
    for (name, value) in extra {
        // a later duplicate replaces an earlier one
        merged.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        merged.push((name.clone(), value.clone()));
    }
    merged
}

/// Classified outcome of one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedResponse {
    /// DNS, connect, TLS or per-request timeout failure. No status.
    NetworkError { message: String },
    /// Non-2xx response. `message` comes from the body when it decodes.
    HttpFailure {
        status: u16,
        message: String,
        body: Option<Value>,
    },
    /// 2xx response. `body` is the decoded JSON, `Null` if there was none.
    Success { status: u16, body: Value },
}

impl NormalizedResponse {
    pub fn status(&self) -> Option<u16> {
        match self {
            NormalizedResponse::NetworkError { .. } => None,
            NormalizedResponse::HttpFailure { status, .. }
            | NormalizedResponse::Success { status, .. } => Some(*status),
        }
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, NormalizedResponse::NetworkError { .. })
    }

    /// Classify a received status and raw body.
    pub fn from_parts(status: u16, raw_body: &[u8]) -> Self {
        let decoded: Option<Value> = if raw_body.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            serde_json::from_slice(raw_body).ok()
        };
        if (200..300).contains(&status) {
            NormalizedResponse::Success {
                status,
                body: decoded.unwrap_or(Value::Null),
            }
        } else {
            let message = decoded
                .as_ref()
                .and_then(extract_message)
                .unwrap_or_else(|| generic_message(status));
            NormalizedResponse::HttpFailure {
                status,
                message,
                body: decoded,
            }
        }
    }
}

/// Pull a human message out of an error body: `message`, then `error`
/// (string or `{message}`), then `errors[0].message`/`errors[0].msg`.
pub fn extract_message(body: &Value) -> Option<String> {
    let as_text = |v: &Value| v.as_str().map(str::to_string).filter(|s| !s.is_empty());

    if let Some(msg) = body.get("message").and_then(as_text) {
        return Some(msg);
    }
    match body.get("error") {
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        Some(Value::Object(obj)) => {
            if let Some(msg) = obj.get("message").and_then(as_text) {
                return Some(msg);
            }
        }
        _ => {}
    }
    body.get("errors")
        .and_then(Value::as_array)
        .and_then(|errs| errs.first())
        .and_then(|first| {
            first
                .get("message")
                .or_else(|| first.get("msg"))
                .and_then(as_text)
        })
}

fn generic_message(status: u16) -> String {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Status");
    format!("HTTP {} {}", status, reason)
}

/// The seam between the probe and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ProbeRequest) -> Result<NormalizedResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_joins_without_double_slash() {
        let req = ProbeRequest::new("http://svc/", "/api/auth/login", HttpMethod::Post);
        assert_eq!(req.url().unwrap(), "http://svc/api/auth/login");
    }

    #[test]
    fn test_missing_path_is_a_fault() {
        let req = ProbeRequest::new("http://svc", "", HttpMethod::Get);
        assert!(matches!(req.url(), Err(TransportError::InvalidRequest(_))));

        let req = ProbeRequest::new("http://svc", "api/login", HttpMethod::Get);
        assert!(req.url().is_err());
    }

    #[test]
    fn test_caller_headers_override_defaults() {
        let req = ProbeRequest::new("http://svc", "/x", HttpMethod::Post)
            .with_header("content-type", "text/plain")
            .with_header("Authorization", "Bearer abc");
        let headers = req.merged_headers();
        assert_eq!(headers.len(), 2);
        assert!(headers.contains(&("content-type".to_string(), "text/plain".to_string())));
        assert!(headers.contains(&("Authorization".to_string(), "Bearer abc".to_string())));
    }

    #[test]
    fn test_defaults_kept_without_collision() {
        let req = ProbeRequest::new("http://svc", "/x", HttpMethod::Get);
        assert_eq!(
            req.merged_headers(),
            vec![("Content-Type".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn test_success_body_returned_verbatim() {
        let resp = NormalizedResponse::from_parts(200, br#"{"token":"t","user":{"id":1}}"#);
        assert_eq!(
            resp,
            NormalizedResponse::Success {
                status: 200,
                body: json!({"token": "t", "user": {"id": 1}}),
            }
        );
    }

    #[test]
    fn test_failure_message_from_body() {
        let resp = NormalizedResponse::from_parts(401, br#"{"message":"Invalid credentials"}"#);
        match resp {
            NormalizedResponse::HttpFailure { status, message, .. } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid credentials");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_failure_falls_back_to_generic_message() {
        let resp = NormalizedResponse::from_parts(502, b"<html>bad gateway</html>");
        match resp {
            NormalizedResponse::HttpFailure { message, body, .. } => {
                assert_eq!(message, "HTTP 502 Bad Gateway");
                assert!(body.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_extract_message_variants() {
        assert_eq!(
            extract_message(&json!({"error": "User not found"})),
            Some("User not found".to_string())
        );
        assert_eq!(
            extract_message(&json!({"error": {"message": "nested"}})),
            Some("nested".to_string())
        );
        assert_eq!(
            extract_message(&json!({"errors": [{"msg": "email is invalid"}]})),
            Some("email is invalid".to_string())
        );
        assert_eq!(extract_message(&json!({"ok": false})), None);
    }
}
