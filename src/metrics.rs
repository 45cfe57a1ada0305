//! Metrics instrumentation for kea-fleet.
//!
//! All metrics are prefixed with `kea_fleet.`

use metrics::{counter, histogram};
use std::time::Instant;

/// Record a fleet lease query.
pub fn record_query(kind: &str, outcome: QueryOutcome, duration: std::time::Duration) {
    let outcome_str = match outcome {
        QueryOutcome::Success => "success",
        QueryOutcome::InventoryError => "inventory_error",
    };

    counter!("kea_fleet.query.count", "kind" => kind.to_string(), "outcome" => outcome_str)
        .increment(1);
    histogram!("kea_fleet.query.duration.seconds", "kind" => kind.to_string())
        .record(duration.as_secs_f64());
}

/// Query outcome for metrics. Per-app failures are not an outcome;
/// they surface through [`record_app_queried`].
#[derive(Debug, Clone, Copy)]
pub enum QueryOutcome {
    /// The query completed, possibly with erred apps.
    Success,
    /// The fleet inventory could not be read.
    InventoryError,
}

/// Record one app queried during a fleet search.
pub fn record_app_queried(erred: bool) {
    let result_str = if erred { "erred" } else { "ok" };
    counter!("kea_fleet.app.queried.count", "result" => result_str).increment(1);
}

/// Record leases found and apps erred for one completed query.
pub fn record_result_counts(leases: usize, erred_apps: usize) {
    histogram!("kea_fleet.query.leases_found").record(leases as f64);
    histogram!("kea_fleet.query.erred_apps").record(erred_apps as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
