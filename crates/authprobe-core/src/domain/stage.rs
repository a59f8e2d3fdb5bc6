//! Pipeline stages of a probe run.

use serde::{Deserialize, Serialize};

/// States of the authentication pipeline state machine.
///
/// `Init` is the initial state; `ProfileValidated` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    SigningUp,
    OtpPending,
    Verified,
    LoggingIn,
    Authenticated,
    ProfileValidated,
    Failed,
}

impl Stage {
    /// Stable snake_case name, used in logs and rendered reports.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::SigningUp => "signing_up",
            Stage::OtpPending => "otp_pending",
            Stage::Verified => "verified",
            Stage::LoggingIn => "logging_in",
            Stage::Authenticated => "authenticated",
            Stage::ProfileValidated => "profile_validated",
            Stage::Failed => "failed",
        }
    }

    /// Whether the state machine stops in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::ProfileValidated | Stage::Failed)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
