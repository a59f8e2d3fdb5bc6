//! Error taxonomy for the probe.
//!
//! Only configuration and programming faults are errors. Expected pipeline
//! failures (unreachable service, rejected login, malformed bodies) are
//! captured as attempt records and never returned through `Err`.

/// Faults raised by the Transport Client for calls it cannot even issue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

/// Probe-level errors surfaced to the caller of `run_probe`.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid target configuration: {0}")]
    InvalidTarget(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("transport fault: {0}")]
    Transport(#[from] TransportError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("probe task for job '{label}' failed: {detail}")]
    Join { label: String, detail: String },
}

/// Result type for probe operations.
pub type Result<T> = std::result::Result<T, ProbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_error_display() {
        let err = ProbeError::InvalidTarget("no base URLs".to_string());
        assert!(err.to_string().contains("invalid target configuration"));

        let err = ProbeError::InvalidCredentials("email is empty".to_string());
        assert!(err.to_string().contains("email is empty"));
    }

    #[test]
    fn test_transport_error_converts() {
        let err: ProbeError = TransportError::InvalidRequest("path is empty".to_string()).into();
        let msg = err.to_string();
        assert!(msg.contains("transport fault"));
        assert!(msg.contains("path is empty"));
    }

    #[test]
    fn test_join_error_names_job() {
        let err = ProbeError::Join {
            label: "staging".to_string(),
            detail: "task panicked".to_string(),
        };
        assert!(err.to_string().contains("staging"));
    }
}
