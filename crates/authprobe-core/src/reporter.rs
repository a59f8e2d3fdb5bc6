//! Diagnostic Reporter: push-only attempt ledger and report rendering.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AttemptRecord, DiagnosticReport, FailureKind, SessionToken, SkippedEndpoint, Stage,
};
use crate::error::Result;
use crate::metrics::METRICS;
use crate::obs;

/// How the run ended, as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// Profile validated.
    Validated,
    /// A stage failed on every variant tried; the failure point is derived
    /// from the recorded attempts.
    StageFailed,
    /// The run stopped before `stage` could finish for a reason that is not a
    /// call outcome (timeout, cancellation, pending verification).
    Halted { stage: Stage, kind: FailureKind },
}

/// Accumulates attempts for one run. Owned exclusively by that run.
#[derive(Debug)]
pub struct DiagnosticReporter {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    started: Instant,
    attempts: Vec<AttemptRecord>,
    skipped: Vec<SkippedEndpoint>,
}

impl Default for DiagnosticReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticReporter {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            started: Instant::now(),
            attempts: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Sequence number the next recorded attempt will carry.
    pub fn next_seq(&self) -> u64 {
        self.attempts.len() as u64 + 1
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub fn record(&mut self, attempt: AttemptRecord) {
        obs::emit_attempt_recorded(&attempt);
        METRICS.inc_attempts_recorded();
        self.attempts.push(attempt);
    }

    pub fn record_skip(&mut self, skipped: SkippedEndpoint) {
        obs::emit_path_skipped(skipped.stage, &skipped.endpoint);
        METRICS.inc_paths_skipped();
        self.skipped.push(skipped);
    }

    /// Earliest stage, in recording order, with attempts and no success.
    fn earliest_failed_stage(&self) -> Option<(Stage, Option<FailureKind>)> {
        let mut seen: Vec<Stage> = Vec::new();
        for attempt in &self.attempts {
            if seen.contains(&attempt.stage) {
                continue;
            }
            seen.push(attempt.stage);
            let mut stage_attempts = self.attempts.iter().filter(|a| a.stage == attempt.stage);
            if stage_attempts.clone().all(|a| !a.succeeded()) {
                let kind = stage_attempts.next_back().and_then(|a| a.failure_kind);
                return Some((attempt.stage, kind));
            }
        }
        None
    }

    /// Close the ledger and build the immutable report.
    pub fn finish(
        self,
        end: RunEnd,
        token: Option<SessionToken>,
        base_url: Option<String>,
    ) -> DiagnosticReport {
        let (final_state, succeeded, failure_point, failure_kind) = match end {
            RunEnd::Validated => (Stage::ProfileValidated, true, None, None),
            RunEnd::StageFailed => {
                let (stage, kind) = self.earliest_failed_stage().unwrap_or((Stage::Init, None));
                (Stage::Failed, false, Some(stage), kind)
            }
            RunEnd::Halted { stage, kind } => {
                let final_state = if kind == FailureKind::VerificationPending {
                    Stage::OtpPending
                } else {
                    Stage::Failed
                };
                (final_state, false, Some(stage), Some(kind))
            }
        };

        let report = DiagnosticReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            base_url,
            final_state,
            succeeded,
            token,
            attempts: self.attempts,
            skipped: self.skipped,
            failure_point,
            failure_kind,
        };
        obs::emit_probe_finished(&report, self.started.elapsed().as_millis() as u64);
        report
    }
}

/// Render a Markdown summary: verdict, then one table row per attempt.
pub fn render_report_md(report: &DiagnosticReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Auth Probe Report {}\n\n", report.run_id));
    out.push_str(&format!(
        "- result: {}\n",
        if report.succeeded { "PASS" } else { "FAIL" }
    ));
    out.push_str(&format!("- final state: `{}`\n", report.final_state));
    out.push_str(&format!(
        "- base URL: {}\n",
        report.base_url.as_deref().unwrap_or("(none reachable)")
    ));
    if let Some(stage) = report.failure_point {
        out.push_str(&format!("- failure point: `{}`\n", stage));
    }
    if let Some(kind) = report.failure_kind {
        out.push_str(&format!("- failure kind: `{}`\n", kind));
    }
    if let Some(token) = &report.token {
        out.push_str(&format!("- token: `{}`\n", token.redacted()));
    }

    let recovered = report.recovered_stages();
    if !recovered.is_empty() {
        out.push_str("\n## Recovered Stages\n\n");
        for (stage, variant) in recovered {
            out.push_str(&format!("- `{}` via `{}`\n", stage, variant));
        }
    }

    out.push_str("\n## Attempts\n\n");
    if report.attempts.is_empty() {
        out.push_str("none\n");
    } else {
        out.push_str("| # | stage | request | variant | status | outcome | message |\n");
        out.push_str("|---|-------|---------|---------|--------|---------|---------|\n");
        for a in &report.attempts {
            out.push_str(&format!(
                "| {} | {} | {} {} | {} | {} | {} | {} |\n",
                a.seq,
                a.stage,
                a.method,
                a.endpoint,
                a.input_variant,
                a.http_status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                match a.failure_kind {
                    Some(kind) => kind.name(),
                    None => "success",
                },
                a.message.as_deref().unwrap_or("").replace('|', "\\|"),
            ));
        }
    }

    if !report.skipped.is_empty() {
        out.push_str("\n## Skipped Paths (404)\n\n");
        for s in &report.skipped {
            out.push_str(&format!("- {} `{}`\n", s.method, s.endpoint));
        }
    }
    out
}

/// Write the report as pretty JSON.
pub fn write_report_json(path: &Path, report: &DiagnosticReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Write the Markdown rendering of the report.
pub fn write_report_md(path: &Path, report: &DiagnosticReport) -> Result<()> {
    std::fs::write(path, render_report_md(report))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttemptOutcome, HttpMethod, InputVariant};

    fn attempt(
        reporter: &DiagnosticReporter,
        stage: Stage,
        outcome: AttemptOutcome,
        kind: Option<FailureKind>,
    ) -> AttemptRecord {
        AttemptRecord {
            seq: reporter.next_seq(),
            stage,
            method: HttpMethod::Post,
            endpoint: "http://svc/api/auth/login".to_string(),
            input_variant: InputVariant::Original,
            http_status: if outcome == AttemptOutcome::NetworkError {
                None
            } else {
                Some(401)
            },
            outcome,
            failure_kind: kind,
            message: Some("Invalid credentials".to_string()),
            started_at: Utc::now(),
            duration_ms: 3,
        }
    }

    #[test]
    fn test_seq_is_dense() {
        let mut reporter = DiagnosticReporter::new();
        assert_eq!(reporter.next_seq(), 1);
        let a = attempt(&reporter, Stage::SigningUp, AttemptOutcome::Success, None);
        reporter.record(a);
        assert_eq!(reporter.next_seq(), 2);
    }

    #[test]
    fn test_failure_point_is_earliest_all_failed_stage() {
        let mut reporter = DiagnosticReporter::new();
        let a = attempt(&reporter, Stage::SigningUp, AttemptOutcome::NetworkError, Some(FailureKind::NetworkError));
        reporter.record(a);
        let a = attempt(&reporter, Stage::SigningUp, AttemptOutcome::Success, None);
        reporter.record(a);
        let a = attempt(&reporter, Stage::LoggingIn, AttemptOutcome::Failure, Some(FailureKind::HttpFailure));
        reporter.record(a);
        let a = attempt(&reporter, Stage::LoggingIn, AttemptOutcome::Failure, Some(FailureKind::MalformedResponse));
        reporter.record(a);

        let report = reporter.finish(RunEnd::StageFailed, None, Some("http://svc".to_string()));
        assert!(!report.succeeded);
        assert_eq!(report.final_state, Stage::Failed);
        assert_eq!(report.failure_point, Some(Stage::LoggingIn));
        assert_eq!(report.failure_kind, Some(FailureKind::MalformedResponse));
        assert_eq!(report.attempts.len(), 4);
    }

    #[test]
    fn test_validated_run_has_no_failure_point() {
        let mut reporter = DiagnosticReporter::new();
        let a = attempt(&reporter, Stage::LoggingIn, AttemptOutcome::Success, None);
        reporter.record(a);
        let report = reporter.finish(
            RunEnd::Validated,
            Some(SessionToken::new("tok")),
            Some("http://svc".to_string()),
        );
        assert!(report.succeeded);
        assert_eq!(report.final_state, Stage::ProfileValidated);
        assert!(report.failure_point.is_none());
        assert!(report.failure_kind.is_none());
    }

    #[test]
    fn test_verification_pending_halts_at_otp() {
        let reporter = DiagnosticReporter::new();
        let report = reporter.finish(
            RunEnd::Halted {
                stage: Stage::OtpPending,
                kind: FailureKind::VerificationPending,
            },
            None,
            None,
        );
        assert_eq!(report.final_state, Stage::OtpPending);
        assert_eq!(report.failure_point, Some(Stage::OtpPending));
        assert!(!report.succeeded);
    }

    #[test]
    fn test_markdown_lists_attempts_and_skips() {
        let mut reporter = DiagnosticReporter::new();
        let a = attempt(&reporter, Stage::LoggingIn, AttemptOutcome::Failure, Some(FailureKind::HttpFailure));
        reporter.record(a);
        reporter.record_skip(SkippedEndpoint {
            stage: Stage::LoggingIn,
            method: HttpMethod::Post,
            endpoint: "http://svc/api/login".to_string(),
            http_status: 404,
        });
        let report = reporter.finish(RunEnd::StageFailed, None, None);
        let md = render_report_md(&report);
        assert!(md.contains("- result: FAIL"));
        assert!(md.contains("- failure point: `logging_in`"));
        assert!(md.contains("| 1 | logging_in | POST http://svc/api/auth/login | original | 401 | http_failure | Invalid credentials |"));
        assert!(md.contains("## Skipped Paths (404)"));
        assert!(md.contains("(none reachable)"));
    }

    #[test]
    fn test_write_report_json_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = DiagnosticReporter::new().finish(RunEnd::Validated, None, None);
        write_report_json(&path, &report).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let back: DiagnosticReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_written_report_never_holds_the_raw_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = DiagnosticReporter::new().finish(
            RunEnd::Validated,
            Some(SessionToken::new("tok-0123456789")),
            Some("http://svc".to_string()),
        );
        write_report_json(&path, &report).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("tok-0123456789"));
        assert!(raw.contains("tok-01…(14 chars)"));

        let back: DiagnosticReport = serde_json::from_str(&raw).unwrap();
        assert!(back.succeeded);
        assert_eq!(back.token.as_ref().map(|t| t.expose()), Some("tok-01…(14 chars)"));
    }
}
