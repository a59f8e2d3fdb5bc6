//! Flow Orchestrator: the signup → OTP → login → profile state machine.
//!
//! Each stage is issued exactly once on the nominal path. A failed stage is
//! handed to the [`VariationProber`]; if it recovers, the run continues from
//! the stage the winning variant advanced to, otherwise the run ends.

use tracing::Instrument;

use crate::config::{OtpMode, ProbeOptions};
use crate::context::{Halt, RunContext};
use crate::contract::{StageCall, StageVerdict};
use crate::domain::{
    Credentials, DiagnosticReport, FailureKind, InputVariant, SessionToken, Stage, TargetConfig,
};
use crate::error::Result;
use crate::metrics::METRICS;
use crate::obs;
use crate::prober::VariationProber;
use crate::reporter::RunEnd;
use crate::transport::Transport;

/// Where the run currently is. Survives a halt so the report can name the
/// stage that was interrupted.
#[derive(Debug)]
struct Progress {
    stage: Stage,
    token: Option<SessionToken>,
}

/// A stage that moved forward, nominally or through a variant.
struct Advanced {
    next: Stage,
    token: Option<SessionToken>,
}

pub struct FlowOrchestrator<'a> {
    transport: &'a dyn Transport,
}

impl<'a> FlowOrchestrator<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// Drive one run to a terminal state and return its report.
    ///
    /// Only faults (a malformed call, an invalid target) come back as `Err`;
    /// every pipeline failure is in the report.
    pub async fn run(
        &self,
        credentials: &Credentials,
        target: &TargetConfig,
        options: &ProbeOptions,
    ) -> Result<DiagnosticReport> {
        let ctx = RunContext::new(self.transport, credentials, target, options);
        let span = obs::probe_span(&ctx.run_id());
        self.execute(ctx).instrument(span).await
    }

    async fn execute(&self, mut ctx: RunContext<'_>) -> Result<DiagnosticReport> {
        obs::emit_probe_started(&ctx.run_id(), &ctx.credentials.email, ctx.target.len());
        METRICS.inc_probes_started();

        let prober = VariationProber::new(ctx.options.probe_variations);
        let mut progress = Progress {
            stage: Stage::Init,
            token: None,
        };

        let end = match self.drive(&mut ctx, &prober, &mut progress).await {
            Ok(end) => end,
            Err(Halt::Timeout) => RunEnd::Halted {
                stage: progress.stage,
                kind: FailureKind::Timeout,
            },
            Err(Halt::Cancelled) => RunEnd::Halted {
                stage: progress.stage,
                kind: FailureKind::Cancelled,
            },
            Err(Halt::Fault(err)) => return Err(err),
        };

        Ok(ctx.finish(end, progress.token))
    }

    async fn drive(
        &self,
        ctx: &mut RunContext<'_>,
        prober: &VariationProber,
        progress: &mut Progress,
    ) -> std::result::Result<RunEnd, Halt> {
        let credentials = ctx.credentials;
        let options = ctx.options;
        let paths = &options.paths;

        loop {
            let call = match progress.stage {
                Stage::Init => {
                    progress.stage = if options.skip_signup {
                        Stage::LoggingIn
                    } else {
                        Stage::SigningUp
                    };
                    continue;
                }
                Stage::SigningUp => StageCall::signup(paths, credentials),
                Stage::OtpPending => match &options.otp {
                    OtpMode::Supplied(code) => StageCall::verify_otp(paths, credentials, code),
                    OtpMode::AssumeVerified => {
                        progress.stage = Stage::LoggingIn;
                        continue;
                    }
                    OtpMode::Halt => {
                        return Ok(RunEnd::Halted {
                            stage: Stage::OtpPending,
                            kind: FailureKind::VerificationPending,
                        })
                    }
                },
                Stage::Verified => {
                    progress.stage = Stage::LoggingIn;
                    continue;
                }
                Stage::LoggingIn => {
                    StageCall::login(&paths.login, &credentials.email, &credentials.password)
                }
                Stage::Authenticated => match &progress.token {
                    Some(token) => StageCall::profile(paths, token),
                    None => {
                        return Ok(RunEnd::Halted {
                            stage: Stage::Authenticated,
                            kind: FailureKind::MalformedResponse,
                        })
                    }
                },
                Stage::ProfileValidated => return Ok(RunEnd::Validated),
                Stage::Failed => return Ok(RunEnd::StageFailed),
            };

            match self.step(ctx, prober, &call).await? {
                Some(advanced) => {
                    if advanced.token.is_some() {
                        progress.token = advanced.token;
                    }
                    progress.stage = advanced.next;
                }
                None => return Ok(RunEnd::StageFailed),
            }
        }
    }

    /// Issue the nominal call for a stage; on failure, let the prober try.
    async fn step(
        &self,
        ctx: &mut RunContext<'_>,
        prober: &VariationProber,
        call: &StageCall,
    ) -> std::result::Result<Option<Advanced>, Halt> {
        let result = ctx.attempt(call, InputVariant::Original).await?;
        if let StageVerdict::Advance { next, token, .. } = result.verdict {
            return Ok(Some(Advanced { next, token }));
        }

        match prober.recover(ctx, call, &result.response).await? {
            Some(recovery) => {
                obs::emit_stage_recovered(call.stage, &recovery.variant);
                METRICS.inc_recoveries();
                Ok(Some(Advanced {
                    next: recovery.next,
                    token: recovery.token,
                }))
            }
            None => Ok(None),
        }
    }
}
