//! Job persistence behind a compare-and-swap leasing primitive.
//!
//! Every worker talks to the store only through [`JobStore`]. Mutual
//! exclusion between workers comes from [`JobStore::claim`] alone: it flips a
//! job from an expected status to `running` and reports whether this caller
//! won. Losing a claim is not an error.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::job::{EnqueueReceipt, Job, JobSnapshot, JobStatus};
use crate::metrics;
use crate::pipeline::BlendRequest;

/// Errors from a job store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    /// The caller no longer holds the lease on this job.
    #[error("Worker {worker_id} does not hold the lease on job {id}")]
    LeaseLost { id: Uuid, worker_id: String },

    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable job records with a status state machine.
///
/// Mutations after a claim (`record_attempt`, `complete`, `release`, `fail`)
/// require the caller to be the current lease holder and return
/// [`StoreError::LeaseLost`] otherwise.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persists a new job and returns it as stored.
    async fn create(&self, job: Job) -> Result<Job, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Oldest `queued` job of `kind`, by creation time.
    async fn oldest_queued(&self, kind: &str) -> Result<Option<Job>, StoreError>;

    /// Atomically moves job `id` from `expected` to `running`, owned by
    /// `worker_id`. Returns false when the job was not in `expected`.
    async fn claim(&self, id: Uuid, expected: JobStatus, worker_id: &str)
        -> Result<bool, StoreError>;

    /// Increments the attempt counter and returns the new value.
    async fn record_attempt(&self, id: Uuid, worker_id: &str) -> Result<u32, StoreError>;

    /// Marks the job `succeeded` with `result`.
    async fn complete(
        &self,
        id: Uuid,
        worker_id: &str,
        result: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Returns the job to `queued`, clears the lease and keeps `error`.
    async fn release(&self, id: Uuid, worker_id: &str, error: &str) -> Result<(), StoreError>;

    /// Marks the job `failed` with `error`.
    async fn fail(&self, id: Uuid, worker_id: &str, error: &str) -> Result<(), StoreError>;

    /// Requeues `running` jobs of `kind` whose lease is older than
    /// `lease_timeout`. Returns how many were reclaimed.
    async fn reclaim_stale(&self, kind: &str, lease_timeout: Duration) -> Result<u64, StoreError>;

    /// Leases the oldest queued job of `kind`.
    ///
    /// Returns `Ok(None)` both when the queue is empty and when another
    /// worker won the claim.
    async fn lease_next(&self, kind: &str, worker_id: &str) -> Result<Option<Job>, StoreError> {
        let Some(candidate) = self.oldest_queued(kind).await? else {
            return Ok(None);
        };

        if !self
            .claim(candidate.id, JobStatus::Queued, worker_id)
            .await?
        {
            debug!(
                worker_id = %worker_id,
                job_id = %candidate.id,
                "Lost claim race"
            );
            metrics::record_lease_contention();
            return Ok(None);
        }

        self.get(candidate.id).await
    }
}

/// Validates `request` and stores it as a queued blend job.
///
/// Returns immediately; a worker picks the job up later.
pub async fn enqueue_blend(
    store: &dyn JobStore,
    request: &BlendRequest,
) -> Result<EnqueueReceipt, StoreError> {
    request
        .validate()
        .map_err(|e| StoreError::InvalidPayload(e.to_string()))?;
    let job = store.create(Job::blend(request)?).await?;
    info!(job_id = %job.id, total_quantity = request.total_quantity, "Enqueued blend job");
    Ok(EnqueueReceipt::from(&job))
}

/// Current poll view of job `id`.
pub async fn poll_job(store: &dyn JobStore, id: Uuid) -> Result<JobSnapshot, StoreError> {
    store
        .get(id)
        .await?
        .map(|job| job.snapshot())
        .ok_or(StoreError::NotFound(id))
}

pub(crate) const LEASE_EXPIRED: &str = "lease expired";

/// Cutoff for stale leases, or `None` when reclaim is disabled.
pub(crate) fn stale_cutoff(lease_timeout: Duration) -> Option<chrono::DateTime<Utc>> {
    if lease_timeout.is_zero() {
        return None;
    }
    let timeout = chrono::Duration::from_std(lease_timeout).ok()?;
    Utc::now().checked_sub_signed(timeout)
}

#[derive(Default)]
struct MemoryState {
    jobs: HashMap<Uuid, Job>,
    order: Vec<Uuid>,
}

/// Process-local job store.
///
/// Used by tests and single-process runs. All operations take one mutex, so
/// `claim` is trivially atomic.
#[derive(Default)]
pub struct InMemoryJobStore {
    state: Mutex<MemoryState>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub fn len(&self) -> usize {
        self.state().map(|s| s.jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    /// Applies `update` to a job leased by `worker_id`.
    fn with_leased<T>(
        &self,
        id: Uuid,
        worker_id: &str,
        update: impl FnOnce(&mut Job) -> T,
    ) -> Result<T, StoreError> {
        let mut state = self.state()?;
        let job = state.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !job.is_leased_by(worker_id) {
            return Err(StoreError::LeaseLost {
                id,
                worker_id: worker_id.to_string(),
            });
        }
        let out = update(&mut *job);
        job.updated_at = Utc::now();
        Ok(out)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: Job) -> Result<Job, StoreError> {
        let mut state = self.state()?;
        if state.jobs.contains_key(&job.id) {
            return Err(StoreError::Backend(format!("duplicate job id {}", job.id)));
        }
        state.order.push(job.id);
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.state()?.jobs.get(&id).cloned())
    }

    async fn oldest_queued(&self, kind: &str) -> Result<Option<Job>, StoreError> {
        let state = self.state()?;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.jobs.get(id))
            .find(|job| job.kind == kind && job.status == JobStatus::Queued)
            .cloned())
    }

    async fn claim(
        &self,
        id: Uuid,
        expected: JobStatus,
        worker_id: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if job.status != expected {
            return Ok(false);
        }
        let now = Utc::now();
        job.status = JobStatus::Running;
        job.lease_owner = Some(worker_id.to_string());
        job.leased_at = Some(now);
        job.updated_at = now;
        Ok(true)
    }

    async fn record_attempt(&self, id: Uuid, worker_id: &str) -> Result<u32, StoreError> {
        self.with_leased(id, worker_id, |job| {
            job.attempts += 1;
            job.attempts
        })
    }

    async fn complete(
        &self,
        id: Uuid,
        worker_id: &str,
        result: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.with_leased(id, worker_id, |job| {
            job.status = JobStatus::Succeeded;
            job.result = Some(result);
            job.error = None;
        })
    }

    async fn release(&self, id: Uuid, worker_id: &str, error: &str) -> Result<(), StoreError> {
        self.with_leased(id, worker_id, |job| {
            job.status = JobStatus::Queued;
            job.error = Some(error.to_string());
            job.lease_owner = None;
            job.leased_at = None;
        })
    }

    async fn fail(&self, id: Uuid, worker_id: &str, error: &str) -> Result<(), StoreError> {
        self.with_leased(id, worker_id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error.to_string());
        })
    }

    async fn reclaim_stale(&self, kind: &str, lease_timeout: Duration) -> Result<u64, StoreError> {
        let Some(cutoff) = stale_cutoff(lease_timeout) else {
            return Ok(0);
        };

        let mut state = self.state()?;
        let now = Utc::now();
        let mut reclaimed = 0;
        for job in state.jobs.values_mut() {
            let stale = job.kind == kind
                && job.status == JobStatus::Running
                && job.leased_at.is_some_and(|at| at < cutoff);
            if stale {
                info!(
                    job_id = %job.id,
                    lease_owner = ?job.lease_owner,
                    "Reclaiming stale lease"
                );
                job.status = JobStatus::Queued;
                job.lease_owner = None;
                job.leased_at = None;
                job.error = Some(LEASE_EXPIRED.to_string());
                job.updated_at = now;
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }
}
