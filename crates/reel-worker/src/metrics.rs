//! Worker metrics.
//!
//! Counters for job outcomes, dispatch fallbacks and watchdog runs.
//! Recorded through the `metrics` facade; exported by Prometheus when
//! the worker binary installs a recorder.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve `/metrics` on `port`.
pub fn install_exporter(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()
}

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Processed jobs by outcome.
    pub const JOBS_TOTAL: &str = "reel_jobs_total";

    /// Job processing time in seconds.
    pub const JOB_DURATION_SECONDS: &str = "reel_job_duration_seconds";

    /// Enqueue attempts that fell back to the retrying state.
    pub const DISPATCH_FALLBACKS_TOTAL: &str = "reel_dispatch_fallbacks_total";

    /// Watchdog runs by result (completed, skipped, aborted).
    pub const WATCHDOG_RUNS_TOTAL: &str = "reel_watchdog_runs_total";

    /// Tracks re-enqueued by the watchdog.
    pub const WATCHDOG_REQUEUED_TOTAL: &str = "reel_watchdog_requeued_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record a finished job.
pub fn record_job(outcome: &str, duration_secs: f64) {
    counter!(names::JOBS_TOTAL, "outcome" => outcome.to_string()).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

/// Record an enqueue that could not reach the broker.
pub fn record_dispatch_fallback() {
    counter!(names::DISPATCH_FALLBACKS_TOTAL).increment(1);
}

/// Record one watchdog run.
pub fn record_watchdog_run(result: &str) {
    counter!(names::WATCHDOG_RUNS_TOTAL, "result" => result.to_string()).increment(1);
}

pub fn record_requeue(count: u64) {
    counter!(names::WATCHDOG_REQUEUED_TOTAL).increment(count);
}

// =============================================================================
// Tests
// =============================================================================
