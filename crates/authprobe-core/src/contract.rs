//! Request/response shape of the remote authentication service.
//!
//! The service itself is opaque; this module only knows how to phrase each
//! stage's request and how to read each stage's response.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::{Credentials, FailureKind, HttpMethod, SessionToken, Stage};
use crate::transport::{NormalizedResponse, ProbeRequest};

/// Endpoint paths of the consumed contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthPaths {
    pub signup: String,
    pub verify_otp: String,
    pub login: String,
    pub profile: String,
    /// Tried in order by the prober after the nominal login path fails.
    pub alternate_login: Vec<String>,
}

impl Default for AuthPaths {
    fn default() -> Self {
        Self {
            signup: "/api/auth/signup".to_string(),
            verify_otp: "/api/auth/verify-otp".to_string(),
            login: "/api/auth/login".to_string(),
            profile: "/api/auth/profile".to_string(),
            alternate_login: vec![
                "/api/auth/signin".to_string(),
                "/api/login".to_string(),
                "/auth/login".to_string(),
            ],
        }
    }
}

/// A logical stage request, independent of which base URL receives it.
#[derive(Debug, Clone, PartialEq)]
pub struct StageCall {
    pub stage: Stage,
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl StageCall {
    pub fn signup(paths: &AuthPaths, creds: &Credentials) -> Self {
        Self {
            stage: Stage::SigningUp,
            method: HttpMethod::Post,
            path: paths.signup.clone(),
            body: Some(json!({
                "name": creds.name,
                "email": creds.email,
                "password": creds.password,
            })),
            headers: Vec::new(),
        }
    }

    pub fn verify_otp(paths: &AuthPaths, creds: &Credentials, otp: &str) -> Self {
        Self {
            stage: Stage::OtpPending,
            method: HttpMethod::Post,
            path: paths.verify_otp.clone(),
            body: Some(json!({
                "email": creds.email,
                "otp": otp,
                "userData": {
                    "name": creds.name,
                    "email": creds.email,
                    "password": creds.password,
                },
            })),
            headers: Vec::new(),
        }
    }

    pub fn login(path: &str, email: &str, password: &str) -> Self {
        Self {
            stage: Stage::LoggingIn,
            method: HttpMethod::Post,
            path: path.to_string(),
            body: Some(json!({ "email": email, "password": password })),
            headers: Vec::new(),
        }
    }

    pub fn profile(paths: &AuthPaths, token: &SessionToken) -> Self {
        Self {
            stage: Stage::Authenticated,
            method: HttpMethod::Get,
            path: paths.profile.clone(),
            body: None,
            headers: vec![("Authorization".to_string(), token.bearer())],
        }
    }

    /// Same call with the body's `password` replaced.
    pub fn with_password(&self, password: &str) -> Self {
        let mut call = self.clone();
        if let Some(Value::Object(body)) = call.body.as_mut() {
            body.insert("password".to_string(), Value::String(password.to_string()));
        }
        call
    }

    pub fn with_path(&self, path: &str) -> Self {
        let mut call = self.clone();
        call.path = path.to_string();
        call
    }

    pub fn to_request(&self, base_url: &str, timeout: Option<Duration>) -> ProbeRequest {
        ProbeRequest {
            base_url: base_url.to_string(),
            path: self.path.clone(),
            method: self.method,
            body: self.body.clone(),
            headers: self.headers.clone(),
            timeout,
        }
    }
}

/// What a stage response means for the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum StageVerdict {
    Advance {
        next: Stage,
        token: Option<SessionToken>,
        note: Option<String>,
    },
    Fail {
        kind: FailureKind,
        message: String,
    },
}

impl StageVerdict {
    pub fn is_advance(&self) -> bool {
        matches!(self, StageVerdict::Advance { .. })
    }

    fn fail(kind: FailureKind, message: impl Into<String>) -> Self {
        StageVerdict::Fail {
            kind,
            message: message.into(),
        }
    }

    fn advance(next: Stage) -> Self {
        StageVerdict::Advance {
            next,
            token: None,
            note: None,
        }
    }
}

/// Read `response` as the answer to a call made in `stage`.
pub fn interpret(stage: Stage, response: &NormalizedResponse, creds: &Credentials) -> StageVerdict {
    match response {
        NormalizedResponse::NetworkError { message } => {
            StageVerdict::fail(FailureKind::NetworkError, message.clone())
        }
        NormalizedResponse::HttpFailure {
            status, message, ..
        } => {
            if stage == Stage::SigningUp && account_exists(*status, message) {
                StageVerdict::Advance {
                    next: Stage::LoggingIn,
                    token: None,
                    note: Some("account already exists".to_string()),
                }
            } else {
                StageVerdict::fail(FailureKind::HttpFailure, message.clone())
            }
        }
        NormalizedResponse::Success { body, .. } => match stage {
            Stage::SigningUp => interpret_signup(body),
            Stage::OtpPending => match session_from(body) {
                Ok(token) => StageVerdict::Advance {
                    next: Stage::Verified,
                    token: Some(token),
                    note: None,
                },
                Err(reason) => StageVerdict::fail(FailureKind::MalformedResponse, reason),
            },
            Stage::LoggingIn => match session_from(body) {
                Ok(token) => StageVerdict::Advance {
                    next: Stage::Authenticated,
                    token: Some(token),
                    note: None,
                },
                Err(reason) => StageVerdict::fail(FailureKind::MalformedResponse, reason),
            },
            Stage::Authenticated => interpret_profile(body, creds),
            other => StageVerdict::fail(
                FailureKind::MalformedResponse,
                format!("no request is issued from stage {other}"),
            ),
        },
    }
}

fn interpret_signup(body: &Value) -> StageVerdict {
    if flag(body, &["otpSent", "otp_sent"]) {
        return StageVerdict::Advance {
            next: Stage::OtpPending,
            token: None,
            note: Some("otp sent".to_string()),
        };
    }
    if let Ok(token) = session_from(body) {
        return StageVerdict::Advance {
            next: Stage::LoggingIn,
            token: Some(token),
            note: Some("signup returned a session".to_string()),
        };
    }
    if flag(body, &["alreadyVerified", "isVerified", "verified"]) {
        return StageVerdict::Advance {
            next: Stage::LoggingIn,
            token: None,
            note: Some("account exists and is verified".to_string()),
        };
    }
    StageVerdict::advance(Stage::LoggingIn)
}

fn interpret_profile(body: &Value, creds: &Credentials) -> StageVerdict {
    let email = body
        .get("email")
        .or_else(|| {
            ["user", "data", "profile"]
                .iter()
                .find_map(|k| body.get(*k).and_then(|inner| inner.get("email")))
        })
        .and_then(Value::as_str);

    match email {
        None => StageVerdict::fail(
            FailureKind::MalformedResponse,
            "profile body carries no email",
        ),
        Some(found) if found.trim().eq_ignore_ascii_case(creds.email.trim()) => {
            StageVerdict::advance(Stage::ProfileValidated)
        }
        Some(found) => StageVerdict::fail(
            FailureKind::MalformedResponse,
            format!("profile email '{}' does not match '{}'", found, creds.email),
        ),
    }
}

/// Both a non-empty `user` object and a non-empty token are required.
fn session_from(body: &Value) -> Result<SessionToken, String> {
    let token = body
        .get("token")
        .or_else(|| body.get("accessToken"))
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty());
    let user_present = body
        .get("user")
        .and_then(Value::as_object)
        .map(|u| !u.is_empty())
        .unwrap_or(false);

    match (token, user_present) {
        (Some(t), true) => Ok(SessionToken::new(t)),
        (None, true) => Err("success response without token".to_string()),
        (Some(_), false) => Err("success response without user".to_string()),
        (None, false) => Err("success response without user or token".to_string()),
    }
}

fn flag(body: &Value, keys: &[&str]) -> bool {
    keys.iter()
        .any(|k| body.get(*k).and_then(Value::as_bool).unwrap_or(false))
}

fn account_exists(status: u16, message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    status == 409 || lower.contains("already exist") || lower.contains("already registered")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("A", "a@x.com", "Secret1!")
    }

    fn ok(body: Value) -> NormalizedResponse {
        NormalizedResponse::Success { status: 200, body }
    }

    #[test]
    fn test_signup_otp_sent_moves_to_otp_pending() {
        let v = interpret(Stage::SigningUp, &ok(json!({"otpSent": true})), &creds());
        assert!(matches!(v, StageVerdict::Advance { next: Stage::OtpPending, .. }));
    }

    #[test]
    fn test_signup_existing_account_skips_to_login() {
        let resp = NormalizedResponse::HttpFailure {
            status: 400,
            message: "User already exists".to_string(),
            body: None,
        };
        let v = interpret(Stage::SigningUp, &resp, &creds());
        assert!(matches!(v, StageVerdict::Advance { next: Stage::LoggingIn, .. }));
    }

    #[test]
    fn test_signup_server_error_fails() {
        let resp = NormalizedResponse::HttpFailure {
            status: 500,
            message: "Internal".to_string(),
            body: None,
        };
        let v = interpret(Stage::SigningUp, &resp, &creds());
        assert!(matches!(v, StageVerdict::Fail { kind: FailureKind::HttpFailure, .. }));
    }

    #[test]
    fn test_login_requires_user_and_token() {
        let v = interpret(Stage::LoggingIn, &ok(json!({"token": "t"})), &creds());
        assert_eq!(
            v,
            StageVerdict::Fail {
                kind: FailureKind::MalformedResponse,
                message: "success response without user".to_string(),
            }
        );

        let v = interpret(
            Stage::LoggingIn,
            &ok(json!({"token": "", "user": {"email": "a@x.com"}})),
            &creds(),
        );
        assert!(matches!(v, StageVerdict::Fail { kind: FailureKind::MalformedResponse, .. }));

        let v = interpret(
            Stage::LoggingIn,
            &ok(json!({"token": "t", "user": {"email": "a@x.com"}})),
            &creds(),
        );
        match v {
            StageVerdict::Advance { next, token, .. } => {
                assert_eq!(next, Stage::Authenticated);
                assert_eq!(token.unwrap().expose(), "t");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_profile_email_must_match() {
        let v = interpret(
            Stage::Authenticated,
            &ok(json!({"user": {"email": "A@X.com"}})),
            &creds(),
        );
        assert!(matches!(v, StageVerdict::Advance { next: Stage::ProfileValidated, .. }));

        let v = interpret(
            Stage::Authenticated,
            &ok(json!({"email": "b@x.com"})),
            &creds(),
        );
        match v {
            StageVerdict::Fail { kind, message } => {
                assert_eq!(kind, FailureKind::MalformedResponse);
                assert!(message.contains("does not match"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let v = interpret(Stage::Authenticated, &ok(Value::Null), &creds());
        assert!(!v.is_advance());
    }

    #[test]
    fn test_network_error_maps_to_kind() {
        let resp = NormalizedResponse::NetworkError {
            message: "connection refused".to_string(),
        };
        let v = interpret(Stage::LoggingIn, &resp, &creds());
        assert!(matches!(v, StageVerdict::Fail { kind: FailureKind::NetworkError, .. }));
    }

    #[test]
    fn test_with_password_rewrites_body_only() {
        let call = StageCall::login("/api/auth/login", "a@x.com", "Secret1!");
        let varied = call.with_password("secret1!");
        assert_eq!(varied.body.as_ref().unwrap()["password"], "secret1!");
        assert_eq!(varied.body.as_ref().unwrap()["email"], "a@x.com");
        assert_eq!(varied.path, call.path);
    }

    #[test]
    fn test_profile_call_carries_bearer() {
        let call = StageCall::profile(&AuthPaths::default(), &SessionToken::new("abc"));
        assert_eq!(call.method, HttpMethod::Get);
        assert_eq!(
            call.headers,
            vec![("Authorization".to_string(), "Bearer abc".to_string())]
        );
    }
}
