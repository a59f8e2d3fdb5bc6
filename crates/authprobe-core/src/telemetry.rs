//! Subscriber setup for the `authprobe` binary.
//!
//! Logs always go to stderr; stdout is reserved for the report. The HTTP
//! stack is held at `warn` unless `RUST_LOG` says otherwise, so `--verbose`
//! shows probe events rather than connection-pool chatter.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const QUIET_DEPS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn"];

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(level: Level) -> EnvFilter {
    let mut directives = vec![level.as_str().to_ascii_lowercase()];
    directives.extend(QUIET_DEPS.iter().map(|d| d.to_string()));
    EnvFilter::new(directives.join(","))
}

/// Install the global subscriber. Only the first call in a process wins.
///
/// JSON lines include the enclosing `probe` span, so every event of a run
/// carries its `run_id`.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));

    let output = if json {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .ok();
}
