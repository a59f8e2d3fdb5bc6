//! In-memory transports (testing only)
//!
//! `ScriptedTransport` answers every request through a routing closure and
//! records what it was sent. `MockAuthService` is a stateless stand-in for
//! the remote authentication service built on top of it.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::contract::AuthPaths;
use crate::error::TransportError;
use crate::transport::{NormalizedResponse, ProbeRequest, Transport};

type Route = dyn Fn(&ProbeRequest) -> NormalizedResponse + Send + Sync;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// 200 with `body`.
pub fn ok(body: Value) -> NormalizedResponse {
    NormalizedResponse::Success { status: 200, body }
}

/// Non-2xx carrying `{"message": message}`.
pub fn http_failure(status: u16, message: &str) -> NormalizedResponse {
    NormalizedResponse::HttpFailure {
        status,
        message: message.to_string(),
        body: Some(json!({ "message": message })),
    }
}

pub fn not_found() -> NormalizedResponse {
    http_failure(404, "Not Found")
}

pub fn unreachable() -> NormalizedResponse {
    NormalizedResponse::NetworkError {
        message: "connection refused".to_string(),
    }
}

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// Transport whose responses come from a closure over the request.
pub struct ScriptedTransport {
    route: Box<Route>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ProbeRequest>>,
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("delay", &self.delay)
            .field("requests", &self.request_count())
            .finish()
    }
}

impl ScriptedTransport {
    pub fn new<F>(route: F) -> Self
    where
        F: Fn(&ProbeRequest) -> NormalizedResponse + Send + Sync + 'static,
    {
        Self {
            route: Box::new(route),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ProbeRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ProbeRequest) -> Result<NormalizedResponse, TransportError> {
        request.url()?;
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok((self.route)(request))
    }
}

// ---------------------------------------------------------------------------
// MockAuthService
// ---------------------------------------------------------------------------

/// Stateless fake of the consumed authentication contract.
///
/// Signup always succeeds; login accepts only `accepted_password` on
/// `login_path`; any other path answers 404. Base URLs listed in
/// `unreachable_bases` fail with a network error.
#[derive(Debug, Clone)]
pub struct MockAuthService {
    pub email: String,
    pub accepted_password: String,
    pub token: String,
    pub login_path: String,
    pub otp_sent: bool,
    pub valid_otp: String,
    pub unreachable_bases: Vec<String>,
    paths: AuthPaths,
}

impl MockAuthService {
    pub fn new(email: impl Into<String>, accepted_password: impl Into<String>) -> Self {
        let paths = AuthPaths::default();
        Self {
            email: email.into(),
            accepted_password: accepted_password.into(),
            token: "tok-0123456789".to_string(),
            login_path: paths.login.clone(),
            otp_sent: false,
            valid_otp: "123456".to_string(),
            unreachable_bases: Vec::new(),
            paths,
        }
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_otp_sent(mut self) -> Self {
        self.otp_sent = true;
        self
    }

    pub fn with_unreachable_base(mut self, base_url: impl Into<String>) -> Self {
        self.unreachable_bases.push(base_url.into());
        self
    }

    pub fn respond(&self, request: &ProbeRequest) -> NormalizedResponse {
        if self
            .unreachable_bases
            .iter()
            .any(|b| request.base_url.trim_end_matches('/') == b.trim_end_matches('/'))
        {
            return unreachable();
        }

        let field = |name: &str| {
            request
                .body
                .as_ref()
                .and_then(|b| b.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let session = || ok(json!({ "token": self.token, "user": { "email": self.email } }));

        let path = request.path.as_str();
        if path == self.paths.signup {
            ok(json!({ "otpSent": self.otp_sent }))
        } else if path == self.paths.verify_otp {
            if field("otp").as_deref() == Some(self.valid_otp.as_str()) {
                session()
            } else {
                http_failure(400, "Invalid OTP")
            }
        } else if path == self.login_path {
            if field("password").as_deref() == Some(self.accepted_password.as_str()) {
                session()
            } else {
                http_failure(401, "Invalid credentials")
            }
        } else if path == self.paths.profile {
            let bearer = format!("Bearer {}", self.token);
            let authorized = request
                .headers
                .iter()
                .any(|(k, v)| k.eq_ignore_ascii_case("authorization") && *v == bearer);
            if authorized {
                ok(json!({ "user": { "email": self.email } }))
            } else {
                http_failure(401, "Unauthorized")
            }
        } else {
            not_found()
        }
    }

    pub fn into_transport(self) -> ScriptedTransport {
        ScriptedTransport::new(move |request| self.respond(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HttpMethod;

    #[tokio::test]
    async fn test_scripted_transport_records_requests() {
        let transport = ScriptedTransport::new(|_| ok(json!({})));
        let request = ProbeRequest::new("http://svc", "/api/auth/login", HttpMethod::Post);
        transport.send(&request).await.unwrap();
        assert_eq!(transport.request_count(), 1);
        assert_eq!(transport.requests()[0].path, "/api/auth/login");
    }

    #[tokio::test]
    async fn test_scripted_transport_rejects_malformed_call() {
        let transport = ScriptedTransport::new(|_| ok(json!({})));
        let request = ProbeRequest::new("http://svc", "", HttpMethod::Get);
        assert!(transport.send(&request).await.is_err());
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_mock_service_login() {
        let service = MockAuthService::new("a@x.com", "secret1!");
        let login = |password: &str| {
            ProbeRequest::new("http://svc", "/api/auth/login", HttpMethod::Post)
                .with_body(json!({ "email": "a@x.com", "password": password }))
        };
        assert_eq!(service.respond(&login("Secret1!")).status(), Some(401));
        assert_eq!(service.respond(&login("secret1!")).status(), Some(200));

        let elsewhere = ProbeRequest::new("http://svc", "/api/login", HttpMethod::Post);
        assert_eq!(service.respond(&elsewhere).status(), Some(404));
    }

    #[test]
    fn test_mock_service_unreachable_base() {
        let service = MockAuthService::new("a@x.com", "pw").with_unreachable_base("http://down/");
        let request = ProbeRequest::new("http://down", "/api/auth/signup", HttpMethod::Post);
        assert!(service.respond(&request).is_network_error());
    }
}
