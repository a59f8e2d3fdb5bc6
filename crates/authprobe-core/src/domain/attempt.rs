//! Attempt records: one per network call a run issues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::Stage;

/// HTTP verbs used by the consumed contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which input variation produced an attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InputVariant {
    /// Nominal inputs on the nominal path.
    Original,
    PasswordLowercase,
    PasswordUppercase,
    /// Original password with trailing punctuation removed.
    PasswordStripped,
    /// Nominal inputs against an alternate endpoint path.
    AlternatePath(String),
    /// Nominal inputs against a later base URL from the target list.
    AlternateBase(String),
}

impl InputVariant {
    pub fn label(&self) -> String {
        match self {
            InputVariant::Original => "original".to_string(),
            InputVariant::PasswordLowercase => "password:lowercase".to_string(),
            InputVariant::PasswordUppercase => "password:uppercase".to_string(),
            InputVariant::PasswordStripped => "password:stripped".to_string(),
            InputVariant::AlternatePath(path) => format!("path:{path}"),
            InputVariant::AlternateBase(base) => format!("base:{base}"),
        }
    }
}

impl std::fmt::Display for InputVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Outcome class of a single call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
    NetworkError,
}

/// Failure taxonomy shared by attempts and reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport could not reach the server.
    NetworkError,
    /// The run exceeded its wall-clock budget.
    Timeout,
    /// Non-2xx response.
    HttpFailure,
    /// 2xx response missing required fields.
    MalformedResponse,
    /// OTP stage reached with no OTP supplied and halting requested.
    VerificationPending,
    /// The caller cancelled the run between stages.
    Cancelled,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::NetworkError => "network_error",
            FailureKind::Timeout => "timeout",
            FailureKind::HttpFailure => "http_failure",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::VerificationPending => "verification_pending",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One network call and what came back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptRecord {
    /// Position in the run, starting at 1.
    pub seq: u64,
    pub stage: Stage,
    pub method: HttpMethod,
    /// Full URL the call was sent to.
    pub endpoint: String,
    pub input_variant: InputVariant,
    pub http_status: Option<u16>,
    pub outcome: AttemptOutcome,
    /// Set for `Failure` and `NetworkError` outcomes.
    pub failure_kind: Option<FailureKind>,
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl AttemptRecord {
    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

/// A probed alternate path that answered 404 and was therefore not counted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedEndpoint {
    pub stage: Stage,
    pub method: HttpMethod,
    pub endpoint: String,
    pub http_status: u16,
}
