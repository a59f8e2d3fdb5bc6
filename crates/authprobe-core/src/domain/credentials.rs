//! Credential record and session token.

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ProbeError, Result};

/// Identity used across every stage of one run. Never mutated during a run.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    /// Reject records the pipeline cannot use at all.
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            return Err(ProbeError::InvalidCredentials("email is empty".to_string()));
        }
        if self.password.is_empty() {
            return Err(ProbeError::InvalidCredentials(
                "password is empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opaque bearer token issued by login or OTP verification.
///
/// Owned by one run only. `Debug`, `Display` and `Serialize` all redact it,
/// so a written report never carries a usable token. Use
/// [`SessionToken::expose`] to build the `Authorization` header.
///
/// Deserializing reads the string back verbatim, which for a stored report
/// is the redacted form.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short, log-safe form: first 6 characters plus the length.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(6).collect();
        format!("{}…({} chars)", prefix, self.0.chars().count())
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl Serialize for SessionToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.redacted())
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionToken({})", self.redacted())
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted())
    }
}
