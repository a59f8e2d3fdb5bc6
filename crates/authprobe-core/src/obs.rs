//! Structured lifecycle events for probe runs.
//!
//! Every event carries an `event` field so log pipelines can filter on it.
//! Tokens never appear here; only the redacted form does.

use tracing::{debug, info, warn};

use crate::domain::{AttemptRecord, DiagnosticReport, InputVariant, Stage};

/// Run-scoped span; attach with `.instrument(..)` so the run future stays
/// `Send` when spawned.
///
/// ```ignore
/// run(ctx).instrument(obs::probe_span(&run_id)).await
/// ```
pub fn probe_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("authprobe.run", run_id = %run_id)
}

pub fn emit_probe_started(run_id: &str, email: &str, targets: usize) {
    info!(event = "probe.started", run_id = %run_id, email = %email, targets = targets);
}

pub fn emit_attempt_recorded(attempt: &AttemptRecord) {
    let status = attempt
        .http_status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    if attempt.succeeded() {
        info!(
            event = "probe.attempt_recorded",
            seq = attempt.seq,
            stage = %attempt.stage,
            endpoint = %attempt.endpoint,
            variant = %attempt.input_variant,
            status = %status,
            outcome = "success",
        );
    } else {
        warn!(
            event = "probe.attempt_recorded",
            seq = attempt.seq,
            stage = %attempt.stage,
            endpoint = %attempt.endpoint,
            variant = %attempt.input_variant,
            status = %status,
            outcome = ?attempt.outcome,
            message = attempt.message.as_deref().unwrap_or(""),
        );
    }
}

pub fn emit_path_skipped(stage: Stage, endpoint: &str) {
    debug!(event = "probe.path_skipped", stage = %stage, endpoint = %endpoint, status = 404);
}

pub fn emit_base_committed(base_url: &str) {
    info!(event = "probe.base_committed", base_url = %base_url);
}

pub fn emit_stage_recovered(stage: Stage, variant: &InputVariant) {
    info!(event = "probe.stage_recovered", stage = %stage, variant = %variant);
}

pub fn emit_probe_finished(report: &DiagnosticReport, duration_ms: u64) {
    info!(
        event = "probe.finished",
        run_id = %report.run_id,
        succeeded = report.succeeded,
        final_state = %report.final_state,
        failure_point = report.failure_point.map(|s| s.name()).unwrap_or("-"),
        failure_kind = report.failure_kind.map(|k| k.name()).unwrap_or("-"),
        attempts = report.attempts.len(),
        token = %report.token.as_ref().map(|t| t.redacted()).unwrap_or_default(),
        duration_ms = duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_span_create() {
        let _guard = probe_span("test-run-id").entered();
        emit_path_skipped(Stage::LoggingIn, "http://svc/api/login");
        emit_base_committed("http://svc");
    }
}
