//! Polling worker that leases blend jobs and runs them through synthesis.
//!
//! A [`Worker`] owns one logical loop. [`Worker::tick`] does a single unit of
//! work (lease, run, write back) and is what tests drive directly;
//! [`Worker::run`] calls it on a timer until shutdown is signalled.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::metrics::{self, InProgressGuard};
use crate::pipeline::{BlendRequest, SynthesisOrchestrator};

use super::job::{Job, BLEND_JOB_KIND};
use super::store::{JobStore, StoreError};

/// Errors that stop a tick.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job store error: {0}")]
    Store(#[from] StoreError),
}

/// Worker loop settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Lease owner id written to claimed jobs.
    pub worker_id: String,
    /// Only jobs with this kind are leased.
    pub job_kind: String,
    /// Sleep between ticks when nothing was leased.
    pub poll_interval: Duration,
    /// Attempts a job gets before it is marked failed.
    pub max_attempts: u32,
    /// Running jobs with older leases are requeued. Zero disables.
    pub lease_timeout: Duration,
    pub reclaim_every_ticks: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: "worker-0".to_string(),
            job_kind: BLEND_JOB_KIND.to_string(),
            poll_interval: Duration::from_secs(2),
            max_attempts: 3,
            lease_timeout: Duration::from_secs(900),
            reclaim_every_ticks: 30,
        }
    }
}

impl WorkerConfig {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }

    pub fn with_job_kind(mut self, kind: impl Into<String>) -> Self {
        self.job_kind = kind.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = timeout;
        self
    }

    pub fn with_reclaim_every_ticks(mut self, ticks: u64) -> Self {
        self.reclaim_every_ticks = ticks;
        self
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Another tick on this worker is still in flight.
    Busy,
    /// No queued job was available, or another worker won the claim.
    Idle,
    Succeeded {
        job_id: Uuid,
        attempt: u32,
        used_fallback_repair: bool,
    },
    /// The run failed and the job went back to the queue.
    Requeued {
        job_id: Uuid,
        attempt: u32,
        error: String,
    },
    Failed {
        job_id: Uuid,
        attempt: u32,
        error: String,
    },
    /// The lease was taken away mid-run; nothing was written back.
    LeaseLost { job_id: Uuid },
}

impl TickOutcome {
    /// Whether the tick touched a job.
    pub fn did_work(&self) -> bool {
        !matches!(self, TickOutcome::Busy | TickOutcome::Idle)
    }
}

/// Counters for one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub ticks: u64,
    pub jobs_succeeded: u64,
    pub jobs_requeued: u64,
    pub jobs_failed: u64,
    pub fallback_repairs: u64,
    pub leases_reclaimed: u64,
}

#[derive(Default)]
struct SharedWorkerStats {
    ticks: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_requeued: AtomicU64,
    jobs_failed: AtomicU64,
    fallback_repairs: AtomicU64,
    leases_reclaimed: AtomicU64,
}

impl SharedWorkerStats {
    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            ticks: self.ticks.load(Ordering::SeqCst),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::SeqCst),
            jobs_requeued: self.jobs_requeued.load(Ordering::SeqCst),
            jobs_failed: self.jobs_failed.load(Ordering::SeqCst),
            fallback_repairs: self.fallback_repairs.load(Ordering::SeqCst),
            leases_reclaimed: self.leases_reclaimed.load(Ordering::SeqCst),
        }
    }
}

/// Holds the busy flag for the lifetime of one tick.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A single polling worker. At most one job is in flight per instance.
pub struct Worker {
    config: WorkerConfig,
    store: Arc<dyn JobStore>,
    orchestrator: Arc<SynthesisOrchestrator>,
    busy: AtomicBool,
    stats: SharedWorkerStats,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn JobStore>,
        orchestrator: Arc<SynthesisOrchestrator>,
    ) -> Self {
        Self {
            config,
            store,
            orchestrator,
            busy: AtomicBool::new(false),
            stats: SharedWorkerStats::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.worker_id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// True while a tick is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.snapshot()
    }

    /// Runs one unit of work.
    ///
    /// Returns [`TickOutcome::Busy`] without touching the store when a
    /// previous tick on this worker has not finished.
    ///
    /// # Errors
    ///
    /// Store failures other than a lost lease.
    pub async fn tick(&self) -> Result<TickOutcome, WorkerError> {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!(worker_id = %self.config.worker_id, "Tick skipped, worker busy");
            return Ok(TickOutcome::Busy);
        };

        let tick = self.stats.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let every = self.config.reclaim_every_ticks;
        if every > 0 && tick % every == 0 {
            self.reclaim_stale().await;
        }

        let Some(job) = self
            .store
            .lease_next(&self.config.job_kind, &self.config.worker_id)
            .await?
        else {
            return Ok(TickOutcome::Idle);
        };

        info!(
            worker_id = %self.config.worker_id,
            job_id = %job.id,
            previous_attempts = job.attempts,
            "Leased job"
        );

        let _in_progress = InProgressGuard::start();
        let started = Instant::now();
        let outcome = self.process(job).await;

        match &outcome {
            Ok(TickOutcome::Succeeded {
                used_fallback_repair,
                ..
            }) => {
                self.stats.jobs_succeeded.fetch_add(1, Ordering::SeqCst);
                if *used_fallback_repair {
                    self.stats.fallback_repairs.fetch_add(1, Ordering::SeqCst);
                }
                metrics::record_job("succeeded", started.elapsed());
            }
            Ok(TickOutcome::Requeued { .. }) => {
                self.stats.jobs_requeued.fetch_add(1, Ordering::SeqCst);
                metrics::record_job("requeued", started.elapsed());
            }
            Ok(TickOutcome::Failed { .. }) => {
                self.stats.jobs_failed.fetch_add(1, Ordering::SeqCst);
                metrics::record_job("failed", started.elapsed());
            }
            _ => {}
        }

        outcome
    }

    /// Main loop. Sweeps stale leases once, then ticks until `shutdown` fires.
    ///
    /// Sleeps `poll_interval` after an idle or failed tick and goes straight
    /// to the next tick after one that processed a job.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            worker_id = %self.config.worker_id,
            job_kind = %self.config.job_kind,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Worker started"
        );

        self.reclaim_stale().await;

        loop {
            let delay = match self.tick().await {
                Ok(outcome) if outcome.did_work() => Duration::ZERO,
                Ok(_) => self.config.poll_interval,
                Err(e) => {
                    error!(worker_id = %self.config.worker_id, error = %e, "Tick failed");
                    self.config.poll_interval
                }
            };

            tokio::select! {
                _ = shutdown.recv() => {
                    info!(worker_id = %self.config.worker_id, "Worker received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(worker_id = %self.config.worker_id, "Worker stopped");
    }

    /// Requeues expired leases. Errors are logged, never propagated.
    pub async fn reclaim_stale(&self) -> u64 {
        if self.config.lease_timeout.is_zero() {
            return 0;
        }
        match self
            .store
            .reclaim_stale(&self.config.job_kind, self.config.lease_timeout)
            .await
        {
            Ok(0) => 0,
            Ok(count) => {
                info!(
                    worker_id = %self.config.worker_id,
                    reclaimed = count,
                    "Reclaimed stale leases"
                );
                self.stats.leases_reclaimed.fetch_add(count, Ordering::SeqCst);
                metrics::record_leases_reclaimed(count);
                count
            }
            Err(e) => {
                warn!(worker_id = %self.config.worker_id, error = %e, "Stale lease sweep failed");
                0
            }
        }
    }

    async fn process(&self, job: Job) -> Result<TickOutcome, WorkerError> {
        let worker_id = self.config.worker_id.as_str();
        let job_id = job.id;

        // Reclaimed after crashes that already used up the budget.
        if job.attempts >= self.config.max_attempts {
            let error = format!(
                "attempt budget of {} exhausted: {}",
                self.config.max_attempts,
                job.error.as_deref().unwrap_or("no error recorded")
            );
            return self.write_failure(job_id, job.attempts, error).await;
        }

        let attempt = match self.store.record_attempt(job_id, worker_id).await {
            Ok(attempt) => attempt,
            Err(StoreError::LeaseLost { .. }) => return Ok(self.lease_lost(job_id)),
            Err(e) => return Err(e.into()),
        };

        let request: BlendRequest = match serde_json::from_value(job.payload) {
            Ok(request) => request,
            Err(e) => {
                let error = format!("invalid job payload: {}", e);
                return self.write_failure(job_id, attempt, error).await;
            }
        };

        info!(
            worker_id = %worker_id,
            job_id = %job_id,
            attempt,
            total_quantity = request.total_quantity,
            objective = %request.objective,
            "Running synthesis"
        );

        let result = match self.orchestrator.run(&request).await {
            Ok(result) => result,
            Err(e) if e.is_retryable() && attempt < self.config.max_attempts => {
                let error = e.to_string();
                warn!(
                    worker_id = %worker_id,
                    job_id = %job_id,
                    attempt,
                    remaining_attempts = self.config.max_attempts - attempt,
                    error = %error,
                    "Synthesis failed, requeueing job"
                );
                return match self.store.release(job_id, worker_id, &error).await {
                    Ok(()) => Ok(TickOutcome::Requeued {
                        job_id,
                        attempt,
                        error,
                    }),
                    Err(StoreError::LeaseLost { .. }) => Ok(self.lease_lost(job_id)),
                    Err(e) => Err(e.into()),
                };
            }
            Err(e) => return self.write_failure(job_id, attempt, e.to_string()).await,
        };

        let used_fallback_repair = result.used_fallback_repair;
        let value = serde_json::to_value(&result).map_err(StoreError::from)?;
        match self.store.complete(job_id, worker_id, value).await {
            Ok(()) => {
                info!(
                    worker_id = %worker_id,
                    job_id = %job_id,
                    attempt,
                    used_fallback_repair,
                    attempts_used = result.attempts_used,
                    total = result.pricing.total,
                    "Job succeeded"
                );
                Ok(TickOutcome::Succeeded {
                    job_id,
                    attempt,
                    used_fallback_repair,
                })
            }
            Err(StoreError::LeaseLost { .. }) => Ok(self.lease_lost(job_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_failure(
        &self,
        job_id: Uuid,
        attempt: u32,
        error: String,
    ) -> Result<TickOutcome, WorkerError> {
        error!(
            worker_id = %self.config.worker_id,
            job_id = %job_id,
            attempt,
            error = %error,
            "Job failed"
        );
        match self
            .store
            .fail(job_id, &self.config.worker_id, &error)
            .await
        {
            Ok(()) => Ok(TickOutcome::Failed {
                job_id,
                attempt,
                error,
            }),
            Err(StoreError::LeaseLost { .. }) => Ok(self.lease_lost(job_id)),
            Err(e) => Err(e.into()),
        }
    }

    fn lease_lost(&self, job_id: Uuid) -> TickOutcome {
        warn!(
            worker_id = %self.config.worker_id,
            job_id = %job_id,
            "Lease lost before write-back"
        );
        TickOutcome::LeaseLost { job_id }
    }
}
