//! Prometheus metrics registration and export.

use prometheus::{Counter, CounterVec, Encoder, Gauge, Histogram, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all blendforge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Jobs finished by a worker, labeled by outcome (succeeded/requeued/failed).
pub static JOBS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Wall time from lease to write-back, in seconds.
pub static JOB_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Generator calls, labeled by outcome (accepted/rejected/error).
pub static GENERATOR_ATTEMPTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Runs that ended in fallback repair.
pub static FALLBACK_REPAIRS_TOTAL: OnceLock<Counter> = OnceLock::new();

/// Claims lost to another worker.
pub static LEASE_CONTENTION_TOTAL: OnceLock<Counter> = OnceLock::new();

/// Stale leases returned to the queue.
pub static LEASES_RECLAIMED_TOTAL: OnceLock<Counter> = OnceLock::new();

/// Jobs currently being processed by this process.
pub static JOBS_IN_PROGRESS: OnceLock<Gauge> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Recording before this is a no-op.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    // Job metrics
    let jobs_total = CounterVec::new(
        Opts::new("blendforge_jobs_total", "Jobs finished by workers"),
        &["outcome"],
    )?;

    let job_duration = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "blendforge_job_duration_seconds",
            "Job processing duration in seconds",
        )
        .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
    )?;

    let jobs_in_progress = Gauge::new(
        "blendforge_jobs_in_progress",
        "Number of jobs currently being processed",
    )?;

    // Synthesis metrics
    let generator_attempts_total = CounterVec::new(
        Opts::new("blendforge_generator_attempts_total", "Generator calls"),
        &["outcome"],
    )?;

    let fallback_repairs_total = Counter::new(
        "blendforge_fallback_repairs_total",
        "Synthesis runs resolved by fallback repair",
    )?;

    // Lease metrics
    let lease_contention_total = Counter::new(
        "blendforge_lease_contention_total",
        "Job claims lost to another worker",
    )?;

    let leases_reclaimed_total = Counter::new(
        "blendforge_leases_reclaimed_total",
        "Stale running jobs returned to the queue",
    )?;

    registry.register(Box::new(jobs_total.clone()))?;
    registry.register(Box::new(job_duration.clone()))?;
    registry.register(Box::new(jobs_in_progress.clone()))?;
    registry.register(Box::new(generator_attempts_total.clone()))?;
    registry.register(Box::new(fallback_repairs_total.clone()))?;
    registry.register(Box::new(lease_contention_total.clone()))?;
    registry.register(Box::new(leases_reclaimed_total.clone()))?;

    // Already-set cells mean a previous init won; keep it.
    let _ = REGISTRY.set(registry);
    let _ = JOBS_TOTAL.set(jobs_total);
    let _ = JOB_DURATION.set(job_duration);
    let _ = JOBS_IN_PROGRESS.set(jobs_in_progress);
    let _ = GENERATOR_ATTEMPTS_TOTAL.set(generator_attempts_total);
    let _ = FALLBACK_REPAIRS_TOTAL.set(fallback_repairs_total);
    let _ = LEASE_CONTENTION_TOTAL.set(lease_contention_total);
    let _ = LEASES_RECLAIMED_TOTAL.set(leases_reclaimed_total);

    tracing::info!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_and_export() {
        let result = init_metrics();
        assert!(result.is_ok() || REGISTRY.get().is_some());

        if let Some(counter) = FALLBACK_REPAIRS_TOTAL.get() {
            counter.inc();
        }

        let metrics = export_metrics();
        assert!(!metrics.starts_with("# Error"));
        assert!(metrics.contains("blendforge_fallback_repairs_total"));
    }
}
