//! Process-wide probe counters.
//!
//! Incremented silently at the call site; [`Metrics::flush`] emits the
//! current values as one `info!` event, typically when a CLI command ends.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    probes_started: AtomicU64,
    attempts_recorded: AtomicU64,
    paths_skipped: AtomicU64,
    recoveries: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            probes_started: AtomicU64::new(0),
            attempts_recorded: AtomicU64::new(0),
            paths_skipped: AtomicU64::new(0),
            recoveries: AtomicU64::new(0),
        }
    }

    pub fn inc_probes_started(&self) {
        self.probes_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "probes_started", "counter incremented");
    }

    pub fn inc_attempts_recorded(&self) {
        self.attempts_recorded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "attempts_recorded", "counter incremented");
    }

    pub fn inc_paths_skipped(&self) {
        self.paths_skipped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "paths_skipped", "counter incremented");
    }

    pub fn inc_recoveries(&self) {
        self.recoveries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "recoveries", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            probes_started = self.probes_started(),
            attempts_recorded = self.attempts_recorded(),
            paths_skipped = self.paths_skipped(),
            recoveries = self.recoveries(),
        );
    }

    pub fn probes_started(&self) -> u64 {
        self.probes_started.load(Ordering::Relaxed)
    }

    pub fn attempts_recorded(&self) -> u64 {
        self.attempts_recorded.load(Ordering::Relaxed)
    }

    pub fn paths_skipped(&self) -> u64 {
        self.paths_skipped.load(Ordering::Relaxed)
    }

    pub fn recoveries(&self) -> u64 {
        self.recoveries.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.probes_started.store(0, Ordering::Relaxed);
        self.attempts_recorded.store(0, Ordering::Relaxed);
        self.paths_skipped.store(0, Ordering::Relaxed);
        self.recoveries.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_probes_started();
        m.inc_attempts_recorded();
        m.inc_attempts_recorded();
        m.inc_paths_skipped();
        assert_eq!(m.probes_started(), 1);
        assert_eq!(m.attempts_recorded(), 2);
        assert_eq!(m.paths_skipped(), 1);
        assert_eq!(m.recoveries(), 0);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_probes_started();
        m.inc_recoveries();
        m.reset();
        assert_eq!(m.probes_started(), 0);
        assert_eq!(m.recoveries(), 0);
    }
}
