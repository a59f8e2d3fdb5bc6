//! Variation Prober: bounded search over inputs of a failed stage.
//!
//! Three independent axes, each tried against otherwise-nominal inputs:
//! alternate base URLs (only while no base URL has answered), password
//! variants, then alternate login paths. The first success wins.

use crate::context::{Halt, RunContext};
use crate::contract::{AuthPaths, StageCall, StageVerdict};
use crate::domain::{InputVariant, SessionToken, Stage};
use crate::transport::NormalizedResponse;

/// The ordered password variants for `password`.
///
/// Original, all-lowercase, all-uppercase, trailing punctuation stripped.
/// A variant whose value repeats an earlier one (or is empty) is dropped.
pub fn password_variants(password: &str) -> Vec<(InputVariant, String)> {
    let candidates = [
        (InputVariant::Original, password.to_string()),
        (InputVariant::PasswordLowercase, password.to_lowercase()),
        (InputVariant::PasswordUppercase, password.to_uppercase()),
        (
            InputVariant::PasswordStripped,
            password
                .trim_end_matches(|c: char| c.is_ascii_punctuation())
                .to_string(),
        ),
    ];

    let mut out: Vec<(InputVariant, String)> = Vec::with_capacity(candidates.len());
    for (variant, value) in candidates {
        if value.is_empty() || out.iter().any(|(_, seen)| *seen == value) {
            continue;
        }
        out.push((variant, value));
    }
    out
}

/// A failed stage that a variant brought back.
#[derive(Debug, Clone)]
pub(crate) struct Recovery {
    pub variant: InputVariant,
    pub next: Stage,
    pub token: Option<SessionToken>,
}

enum BaseFallback {
    Recovered(Recovery),
    /// Some base answered without advancing; the run is now committed there.
    Committed,
    Unreachable,
}

#[derive(Debug, Clone, Copy)]
pub struct VariationProber {
    probe_inputs: bool,
}

impl VariationProber {
    /// `probe_inputs = false` keeps base URL fallback but skips the password
    /// and path axes.
    pub fn new(probe_inputs: bool) -> Self {
        Self { probe_inputs }
    }

    /// Every login variant that would be tried after a nominal failure, in
    /// order, excluding the nominal call itself.
    pub fn plan(&self, password: &str, paths: &AuthPaths) -> Vec<InputVariant> {
        if !self.probe_inputs {
            return Vec::new();
        }
        let passwords = password_variants(password)
            .into_iter()
            .map(|(variant, _)| variant)
            .filter(|variant| *variant != InputVariant::Original);
        let alternates = paths
            .alternate_login
            .iter()
            .filter(|path| **path != paths.login)
            .map(|path| InputVariant::AlternatePath(path.clone()));
        passwords.chain(alternates).collect()
    }

    pub(crate) async fn recover(
        &self,
        ctx: &mut RunContext<'_>,
        call: &StageCall,
        failure: &NormalizedResponse,
    ) -> Result<Option<Recovery>, Halt> {
        if failure.is_network_error() {
            if ctx.is_committed() {
                return Ok(None);
            }
            match self.try_bases(ctx, call).await? {
                BaseFallback::Recovered(recovery) => return Ok(Some(recovery)),
                BaseFallback::Unreachable => return Ok(None),
                BaseFallback::Committed => {}
            }
        }

        if call.stage != Stage::LoggingIn || !self.probe_inputs {
            return Ok(None);
        }
        if let Some(recovery) = self.try_passwords(ctx, call).await? {
            return Ok(Some(recovery));
        }
        self.try_paths(ctx, call).await
    }

    async fn try_bases(
        &self,
        ctx: &mut RunContext<'_>,
        call: &StageCall,
    ) -> Result<BaseFallback, Halt> {
        let target = ctx.target;
        for index in (ctx.base_index() + 1)..target.len() {
            let Some(base_url) = target.get(index) else {
                break;
            };
            let variant = InputVariant::AlternateBase(base_url.to_string());
            let result = ctx.attempt_at(index, call, variant.clone()).await?;
            if let Some(recovery) = advanced(&result.verdict, variant) {
                return Ok(BaseFallback::Recovered(recovery));
            }
            if ctx.is_committed() {
                return Ok(BaseFallback::Committed);
            }
        }
        Ok(BaseFallback::Unreachable)
    }

    async fn try_passwords(
        &self,
        ctx: &mut RunContext<'_>,
        call: &StageCall,
    ) -> Result<Option<Recovery>, Halt> {
        let credentials = ctx.credentials;
        for (variant, password) in password_variants(&credentials.password) {
            if variant == InputVariant::Original {
                continue;
            }
            let result = ctx.attempt(&call.with_password(&password), variant.clone()).await?;
            if let Some(recovery) = advanced(&result.verdict, variant) {
                return Ok(Some(recovery));
            }
        }
        Ok(None)
    }

    async fn try_paths(
        &self,
        ctx: &mut RunContext<'_>,
        call: &StageCall,
    ) -> Result<Option<Recovery>, Halt> {
        let options = ctx.options;
        for path in &options.paths.alternate_login {
            if *path == call.path {
                continue;
            }
            let variant = InputVariant::AlternatePath(path.clone());
            let Some(result) = ctx.probe_path(&call.with_path(path), variant.clone()).await?
            else {
                continue;
            };
            if let Some(recovery) = advanced(&result.verdict, variant) {
                return Ok(Some(recovery));
            }
        }
        Ok(None)
    }
}

fn advanced(verdict: &StageVerdict, variant: InputVariant) -> Option<Recovery> {
    match verdict {
        StageVerdict::Advance { next, token, .. } => Some(Recovery {
            variant,
            next: *next,
            token: token.clone(),
        }),
        StageVerdict::Fail { .. } => None,
    }
}
