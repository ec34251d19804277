//! Recording helpers for blendforge metrics.
//!
//! Every helper is a no-op until [`init_metrics`](super::init_metrics) has run,
//! so library code can record unconditionally.

use std::time::Duration;

use super::prometheus::{
    FALLBACK_REPAIRS_TOTAL, GENERATOR_ATTEMPTS_TOTAL, JOBS_IN_PROGRESS, JOBS_TOTAL, JOB_DURATION,
    LEASES_RECLAIMED_TOTAL, LEASE_CONTENTION_TOTAL,
};

/// Records one generator call. `outcome` is "accepted", "rejected" or "error".
pub fn record_generator_attempt(outcome: &str) {
    if let Some(counter) = GENERATOR_ATTEMPTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Records a run that ended in fallback repair.
pub fn record_fallback_repair() {
    if let Some(counter) = FALLBACK_REPAIRS_TOTAL.get() {
        counter.inc();
    }
}

/// Records a finished job. `outcome` is "succeeded", "requeued" or "failed".
pub fn record_job(outcome: &str, duration: Duration) {
    if let Some(counter) = JOBS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
    if let Some(histogram) = JOB_DURATION.get() {
        histogram.observe(duration.as_secs_f64());
    }
    tracing::trace!(
        outcome = outcome,
        duration_secs = duration.as_secs_f64(),
        "Recorded job metric"
    );
}

/// Records a claim that lost the race to another worker.
pub fn record_lease_contention() {
    if let Some(counter) = LEASE_CONTENTION_TOTAL.get() {
        counter.inc();
    }
}

/// Records stale leases returned to the queue.
pub fn record_leases_reclaimed(count: u64) {
    if let Some(counter) = LEASES_RECLAIMED_TOTAL.get() {
        counter.inc_by(count as f64);
    }
}

/// Tracks one in-flight job on the gauge for as long as it lives.
#[derive(Debug)]
pub struct InProgressGuard(());

impl InProgressGuard {
    pub fn start() -> Self {
        if let Some(gauge) = JOBS_IN_PROGRESS.get() {
            gauge.inc();
        }
        Self(())
    }
}

impl Drop for InProgressGuard {
    fn drop(&mut self) {
        if let Some(gauge) = JOBS_IN_PROGRESS.get() {
            gauge.dec();
        }
    }
}
