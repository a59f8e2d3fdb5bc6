//! Probe data model.

pub mod attempt;
pub mod credentials;
pub mod report;
pub mod stage;
pub mod target;

pub use attempt::{
    AttemptOutcome, AttemptRecord, FailureKind, HttpMethod, InputVariant, SkippedEndpoint,
};
pub use credentials::{Credentials, SessionToken};
pub use report::DiagnosticReport;
pub use stage::Stage;
pub use target::{TargetConfig, BASE_URLS_ENV};
