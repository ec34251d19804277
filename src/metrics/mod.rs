//! Prometheus metrics for blendforge workers and synthesis runs.
//!
//! # Example
//!
//! ```ignore
//! use blendforge::metrics::{export_metrics, init_metrics, record_job};
//!
//! init_metrics().expect("Failed to initialize metrics");
//! record_job("succeeded", elapsed);
//! println!("{}", export_metrics());
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::{
    record_fallback_repair, record_generator_attempt, record_job, record_lease_contention,
    record_leases_reclaimed, InProgressGuard,
};
pub use prometheus::{export_metrics, init_metrics};
