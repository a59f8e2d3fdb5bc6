//! Per-run state shared by the orchestrator and the prober.
//!
//! Every network call of a run goes through [`RunContext::attempt`] (or its
//! path-probing sibling), which checks cancellation and the run deadline,
//! issues the request, interprets the response for the call's stage, and
//! appends one attempt record. A 404 during path probing is logged as a
//! skipped endpoint instead.
//!
//! A call that fails at the transport after the run deadline has passed was
//! cut short by the clamped request timeout. It is recorded with
//! `FailureKind::Timeout` and the run halts.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::config::ProbeOptions;
use crate::contract::{interpret, StageCall, StageVerdict};
use crate::domain::{
    AttemptOutcome, AttemptRecord, Credentials, DiagnosticReport, FailureKind, InputVariant,
    SessionToken, SkippedEndpoint, TargetConfig,
};
use crate::error::ProbeError;
use crate::obs;
use crate::reporter::{DiagnosticReporter, RunEnd};
use crate::transport::{NormalizedResponse, Transport};

/// Why a run stopped issuing calls other than a stage outcome.
#[derive(Debug)]
pub(crate) enum Halt {
    Timeout,
    Cancelled,
    Fault(ProbeError),
}

/// A recorded call and what it means for the stage.
#[derive(Debug, Clone)]
pub(crate) struct CallResult {
    pub response: NormalizedResponse,
    pub verdict: StageVerdict,
}

/// A response before it is recorded.
struct Sent {
    endpoint: String,
    response: NormalizedResponse,
    started_at: DateTime<Utc>,
    duration_ms: u64,
}

pub(crate) struct RunContext<'a> {
    transport: &'a dyn Transport,
    pub credentials: &'a Credentials,
    pub target: &'a TargetConfig,
    pub options: &'a ProbeOptions,
    reporter: DiagnosticReporter,
    base_index: usize,
    committed: bool,
    deadline: Option<Instant>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        credentials: &'a Credentials,
        target: &'a TargetConfig,
        options: &'a ProbeOptions,
    ) -> Self {
        Self {
            transport,
            credentials,
            target,
            options,
            reporter: DiagnosticReporter::new(),
            base_index: 0,
            committed: false,
            deadline: options.run_timeout.map(|t| Instant::now() + t),
        }
    }

    pub fn run_id(&self) -> String {
        self.reporter.run_id().to_string()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn base_index(&self) -> usize {
        self.base_index
    }

    /// Issue `call` against the current base URL and record it.
    pub async fn attempt(
        &mut self,
        call: &StageCall,
        variant: InputVariant,
    ) -> Result<CallResult, Halt> {
        let base = self.base_index;
        self.attempt_at(base, call, variant).await
    }

    /// Issue `call` against the base URL at `base_index` and record it.
    pub async fn attempt_at(
        &mut self,
        base_index: usize,
        call: &StageCall,
        variant: InputVariant,
    ) -> Result<CallResult, Halt> {
        let sent = self.send(base_index, call).await?;
        self.settle(call, variant, sent)
    }

    /// Like [`attempt`](Self::attempt), but a 404 is logged as a skipped
    /// endpoint instead of an attempt and `None` is returned.
    pub async fn probe_path(
        &mut self,
        call: &StageCall,
        variant: InputVariant,
    ) -> Result<Option<CallResult>, Halt> {
        let base = self.base_index;
        let sent = self.send(base, call).await?;
        if sent.response.status() == Some(404) {
            self.reporter.record_skip(SkippedEndpoint {
                stage: call.stage,
                method: call.method,
                endpoint: sent.endpoint,
                http_status: 404,
            });
            return Ok(None);
        }
        self.settle(call, variant, sent).map(Some)
    }

    fn check_budget(&self) -> Result<Option<Duration>, Halt> {
        if self.options.cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        match self.deadline {
            None => Ok(None),
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    Err(Halt::Timeout)
                } else {
                    Ok(Some(remaining))
                }
            }
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Record a sent call, halting if the run budget ran out while it was in
    /// flight.
    fn settle(
        &mut self,
        call: &StageCall,
        variant: InputVariant,
        sent: Sent,
    ) -> Result<CallResult, Halt> {
        let timed_out = sent.response.is_network_error() && self.deadline_passed();
        let result = self.record(call, variant, sent, timed_out);
        if timed_out {
            return Err(Halt::Timeout);
        }
        Ok(result)
    }

    async fn send(&mut self, base_index: usize, call: &StageCall) -> Result<Sent, Halt> {
        let remaining = self.check_budget()?;
        let target = self.target;
        let base_url = target.get(base_index).ok_or_else(|| {
            Halt::Fault(ProbeError::InvalidTarget(format!(
                "no base URL at index {}",
                base_index
            )))
        })?;
        let timeout = match remaining {
            Some(r) => r.min(self.options.request_timeout),
            None => self.options.request_timeout,
        };

        let request = call.to_request(base_url, Some(timeout));
        let endpoint = request
            .url()
            .map_err(|e| Halt::Fault(ProbeError::Transport(e)))?;
        let started_at = Utc::now();
        let started = Instant::now();
        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| Halt::Fault(ProbeError::Transport(e)))?;
        let duration_ms = started.elapsed().as_millis() as u64;

        if !response.is_network_error() && !self.committed {
            self.base_index = base_index;
            self.committed = true;
            obs::emit_base_committed(base_url);
        }

        Ok(Sent {
            endpoint,
            response,
            started_at,
            duration_ms,
        })
    }

    fn record(
        &mut self,
        call: &StageCall,
        variant: InputVariant,
        sent: Sent,
        timed_out: bool,
    ) -> CallResult {
        let verdict = interpret(call.stage, &sent.response, self.credentials);
        let (outcome, failure_kind, message) = match &verdict {
            StageVerdict::Advance { note, .. } => (AttemptOutcome::Success, None, note.clone()),
            StageVerdict::Fail { kind, message } => {
                let outcome = if *kind == FailureKind::NetworkError {
                    AttemptOutcome::NetworkError
                } else {
                    AttemptOutcome::Failure
                };
                let kind = if timed_out { FailureKind::Timeout } else { *kind };
                (outcome, Some(kind), Some(message.clone()))
            }
        };

        self.reporter.record(AttemptRecord {
            seq: self.reporter.next_seq(),
            stage: call.stage,
            method: call.method,
            endpoint: sent.endpoint,
            input_variant: variant,
            http_status: sent.response.status(),
            outcome,
            failure_kind,
            message,
            started_at: sent.started_at,
            duration_ms: sent.duration_ms,
        });

        CallResult {
            response: sent.response,
            verdict,
        }
    }

    pub fn finish(self, end: RunEnd, token: Option<SessionToken>) -> DiagnosticReport {
        let base_url = if self.committed {
            self.target.get(self.base_index).map(str::to_string)
        } else {
            None
        };
        self.reporter.finish(end, token, base_url)
    }
}
