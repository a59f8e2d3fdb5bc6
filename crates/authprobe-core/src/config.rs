//! Run options and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::contract::AuthPaths;

pub const RUN_TIMEOUT_ENV: &str = "AUTHPROBE_RUN_TIMEOUT_SECS";
pub const REQUEST_TIMEOUT_ENV: &str = "AUTHPROBE_REQUEST_TIMEOUT_SECS";

/// Per-request timeout when nothing else is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// How the OtpPending → Verified transition is handled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OtpMode {
    /// Verify with this code.
    Supplied(String),
    /// Skip verification and go straight to login (verified out of band).
    #[default]
    AssumeVerified,
    /// Stop the run at OtpPending with a VerificationPending outcome.
    Halt,
}

/// Cooperative cancellation shared between a caller and its runs.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Knobs for one probe run.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub otp: OtpMode,
    /// Start at LoggingIn for accounts known to exist.
    pub skip_signup: bool,
    /// When false, a failed stage is reported without trying variants.
    pub probe_variations: bool,
    /// Wall-clock budget for the whole run.
    pub run_timeout: Option<Duration>,
    pub request_timeout: Duration,
    pub paths: AuthPaths,
    pub cancel: CancelFlag,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            otp: OtpMode::default(),
            skip_signup: false,
            probe_variations: true,
            run_timeout: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            paths: AuthPaths::default(),
            cancel: CancelFlag::new(),
        }
    }
}

impl ProbeOptions {
    /// Defaults, with timeouts taken from `AUTHPROBE_RUN_TIMEOUT_SECS` and
    /// `AUTHPROBE_REQUEST_TIMEOUT_SECS` when set to a positive integer.
    pub fn from_env() -> Self {
        let secs = |key: &str| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
        };
        Self {
            run_timeout: secs(RUN_TIMEOUT_ENV),
            request_timeout: secs(REQUEST_TIMEOUT_ENV).unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            ..Self::default()
        }
    }

    pub fn with_otp(mut self, otp: impl Into<String>) -> Self {
        self.otp = OtpMode::Supplied(otp.into());
        self
    }

    pub fn with_otp_mode(mut self, mode: OtpMode) -> Self {
        self.otp = mode;
        self
    }

    pub fn skipping_signup(mut self) -> Self {
        self.skip_signup = true;
        self
    }

    pub fn without_variations(mut self) -> Self {
        self.probe_variations = false;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_paths(mut self, paths: AuthPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}
