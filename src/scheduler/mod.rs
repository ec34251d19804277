//! Durable blend jobs and the workers that execute them.
//!
//! - **Job**: persisted record with a `queued → running → succeeded|failed`
//!   state machine
//! - **JobStore**: persistence trait with a compare-and-swap `claim`
//! - **Worker**: busy-guarded polling loop built on `tick()`
//!
//! # Architecture
//!
//! ```text
//!   enqueue ──▶ ┌───────────┐ ◀── poll
//!               │ JobStore  │
//!               └─────┬─────┘
//!        claim (CAS)  │
//!         ┌───────────┼───────────┐
//!         ▼           ▼           ▼
//!    ┌─────────┐ ┌─────────┐ ┌─────────┐
//!    │ Worker 1│ │ Worker 2│ │ Worker N│
//!    └─────────┘ └─────────┘ └─────────┘
//! ```
//!
//! Workers share nothing but the store. Losing a claim race is reported as an
//! idle tick.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use blendforge::scheduler::{enqueue_blend, InMemoryJobStore, Worker, WorkerConfig};
//!
//! let store = Arc::new(InMemoryJobStore::new());
//! let receipt = enqueue_blend(store.as_ref(), &BlendRequest::new(250)).await?;
//!
//! let worker = Worker::new(WorkerConfig::new("worker-1"), store, orchestrator);
//! let outcome = worker.tick().await?;
//! ```

pub mod job;
pub mod store;
pub mod worker;

pub use job::{EnqueueReceipt, Job, JobSnapshot, JobStatus, BLEND_JOB_KIND};
pub use store::{enqueue_blend, poll_job, InMemoryJobStore, JobStore, StoreError};
pub use worker::{TickOutcome, Worker, WorkerConfig, WorkerError, WorkerStats};
