//! The diagnostic report returned once per run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::attempt::{AttemptRecord, FailureKind, InputVariant, SkippedEndpoint};
use super::credentials::SessionToken;
use super::stage::Stage;

/// Result of one probe run. Built once by the reporter and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Base URL the run committed to, if any deployment answered.
    pub base_url: Option<String>,
    pub final_state: Stage,
    pub succeeded: bool,
    pub token: Option<SessionToken>,
    pub attempts: Vec<AttemptRecord>,
    /// Alternate paths that answered 404; not counted as attempts.
    pub skipped: Vec<SkippedEndpoint>,
    /// Set iff `succeeded` is false.
    pub failure_point: Option<Stage>,
    pub failure_kind: Option<FailureKind>,
}

impl DiagnosticReport {
    /// Attempts issued while the machine was in `stage`, in order.
    pub fn attempts_for(&self, stage: Stage) -> impl Iterator<Item = &AttemptRecord> {
        self.attempts.iter().filter(move |a| a.stage == stage)
    }

    /// The successful attempt that carried `stage` forward, if any.
    pub fn winning_attempt(&self, stage: Stage) -> Option<&AttemptRecord> {
        self.attempts_for(stage).find(|a| a.succeeded())
    }

    /// Variant that carried `stage` forward, if any.
    pub fn winning_variant(&self, stage: Stage) -> Option<&InputVariant> {
        self.winning_attempt(stage).map(|a| &a.input_variant)
    }

    /// Stages that needed a non-original variant to succeed.
    pub fn recovered_stages(&self) -> Vec<(Stage, &InputVariant)> {
        self.attempts
            .iter()
            .filter(|a| a.succeeded() && a.input_variant != InputVariant::Original)
            .map(|a| (a.stage, &a.input_variant))
            .collect()
    }

    /// Last failed attempt, the usual starting point when reading a report.
    pub fn last_failure(&self) -> Option<&AttemptRecord> {
        self.attempts.iter().rev().find(|a| !a.succeeded())
    }

    /// SHA-256 over the report content with run identity and all timing
    /// stripped. Two runs against the same stateless service with the same
    /// inputs produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.remove("run_id");
            obj.remove("started_at");
            obj.remove("finished_at");
            if let Some(Value::Array(attempts)) = obj.get_mut("attempts") {
                for attempt in attempts.iter_mut() {
                    if let Some(a) = attempt.as_object_mut() {
                        a.remove("started_at");
                        a.remove("duration_ms");
                    }
                }
            }
        }
        let mut hasher = Sha256::new();
        hasher.update(value.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attempt::{AttemptOutcome, HttpMethod};

    fn attempt(seq: u64, stage: Stage, variant: InputVariant, ok: bool) -> AttemptRecord {
        AttemptRecord {
            seq,
            stage,
            method: HttpMethod::Post,
            endpoint: "http://svc/api/auth/login".to_string(),
            input_variant: variant,
            http_status: Some(if ok { 200 } else { 401 }),
            outcome: if ok {
                AttemptOutcome::Success
            } else {
                AttemptOutcome::Failure
            },
            failure_kind: if ok { None } else { Some(FailureKind::HttpFailure) },
            message: None,
            started_at: Utc::now(),
            duration_ms: seq * 7,
        }
    }

    fn report(attempts: Vec<AttemptRecord>) -> DiagnosticReport {
        DiagnosticReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            base_url: Some("http://svc".to_string()),
            final_state: Stage::ProfileValidated,
            succeeded: true,
            token: Some(SessionToken::new("tok")),
            attempts,
            skipped: vec![],
            failure_point: None,
            failure_kind: None,
        }
    }

    #[test]
    fn test_winning_variant_is_first_success() {
        let r = report(vec![
            attempt(1, Stage::LoggingIn, InputVariant::Original, false),
            attempt(2, Stage::LoggingIn, InputVariant::PasswordLowercase, true),
        ]);
        assert_eq!(
            r.winning_variant(Stage::LoggingIn),
            Some(&InputVariant::PasswordLowercase)
        );
        assert_eq!(r.attempts_for(Stage::LoggingIn).count(), 2);
        assert_eq!(r.recovered_stages().len(), 1);
        assert_eq!(r.last_failure().map(|a| a.seq), Some(1));
    }

    #[test]
    fn test_fingerprint_ignores_identity_and_timing() {
        let a = report(vec![attempt(1, Stage::LoggingIn, InputVariant::Original, true)]);
        let mut b = a.clone();
        b.run_id = Uuid::new_v4();
        b.attempts[0].duration_ms = 9_999;
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = report(vec![attempt(1, Stage::LoggingIn, InputVariant::Original, true)]);
        let mut b = a.clone();
        b.attempts[0].http_status = Some(201);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
