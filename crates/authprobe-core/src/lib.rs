//! Authentication-flow diagnostic probe
//!
//! Drives signup → OTP verification → login → profile validation against a
//! remote authentication service, probes bounded input variations when a
//! stage fails, and returns one [`DiagnosticReport`] describing every call
//! that was made.
//!
//! ```ignore
//! let transport = HttpTransport::new(DEFAULT_REQUEST_TIMEOUT)?;
//! let target = TargetConfig::new(["https://staging.example.com"])?;
//! let creds = Credentials::new("A", "a@x.com", "Secret1!");
//! let report = run_probe(&transport, &creds, &target, &ProbeOptions::default()).await?;
//! println!("{}", render_report_md(&report));
//! ```

pub mod config;
mod context;
pub mod contract;
pub mod domain;
pub mod error;
pub mod fakes;
pub mod http;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod prober;
pub mod reporter;
pub mod runner;
pub mod telemetry;
pub mod transport;

pub use config::{CancelFlag, OtpMode, ProbeOptions, DEFAULT_REQUEST_TIMEOUT};
pub use contract::{AuthPaths, StageCall, StageVerdict};
pub use domain::{
    AttemptOutcome, AttemptRecord, Credentials, DiagnosticReport, FailureKind, HttpMethod,
    InputVariant, SessionToken, SkippedEndpoint, Stage, TargetConfig,
};
pub use error::{ProbeError, Result, TransportError};
pub use http::HttpTransport;
pub use orchestrator::FlowOrchestrator;
pub use prober::{password_variants, VariationProber};
pub use reporter::{render_report_md, write_report_json, write_report_md, DiagnosticReporter};
pub use runner::{run_probe, run_probes, ProbeJob};
pub use transport::{NormalizedResponse, ProbeRequest, Transport};

/// Crate version, reported in the HTTP user agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
