//! Job records and their status state machine.
//!
//! ```text
//! queued ──claim──▶ running ──complete──▶ succeeded
//!    ▲                 │
//!    └────release──────┤
//!                      └──fail──────────▶ failed
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::BlendRequest;

/// Kind tag for blend synthesis jobs.
pub const BLEND_JOB_KIND: &str = "blend";

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Returns true for `succeeded` and `failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// A persisted unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: Uuid,
    /// Type tag workers filter on.
    pub kind: String,
    pub status: JobStatus,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    /// Last error. Kept on requeue so pollers can see why a retry happened.
    pub error: Option<String>,
    pub attempts: u32,
    pub leased_at: Option<DateTime<Utc>>,
    pub lease_owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a queued job with zero attempts and no lease.
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            status: JobStatus::Queued,
            payload,
            result: None,
            error: None,
            attempts: 0,
            leased_at: None,
            lease_owner: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a queued blend job for the request.
    pub fn blend(request: &BlendRequest) -> Result<Self, serde_json::Error> {
        Ok(Self::new(BLEND_JOB_KIND, serde_json::to_value(request)?))
    }

    /// Returns whether the job is currently leased by `worker_id`.
    pub fn is_leased_by(&self, worker_id: &str) -> bool {
        self.status == JobStatus::Running && self.lease_owner.as_deref() == Some(worker_id)
    }

    /// The fields pollers see.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            status: self.status,
            attempts: self.attempts,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

/// What enqueueing hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnqueueReceipt {
    pub job_id: Uuid,
    pub status: JobStatus,
}

impl From<&Job> for EnqueueReceipt {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
        }
    }
}

/// Poll view of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub status: JobStatus,
    pub attempts: u32,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_job_is_queued() {
        let job = Job::new("blend", json!({"total_quantity": 250}));
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.attempts, 0);
        assert!(job.lease_owner.is_none());
        assert!(job.leased_at.is_none());
        assert!(job.result.is_none());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn test_blend_job_payload() {
        let job = Job::blend(&BlendRequest::new(500)).expect("job");
        assert_eq!(job.kind, BLEND_JOB_KIND);
        assert_eq!(job.payload["total_quantity"], json!(500));
        assert_eq!(job.payload["objective"], json!("balanced"));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Succeeded,
            JobStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>(), Ok(status));
            assert_eq!(
                serde_json::to_value(status).expect("serialize"),
                json!(status.as_str())
            );
        }
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_snapshot_and_receipt() {
        let mut job = Job::new("blend", json!({}));
        job.error = Some("lease expired".to_string());
        job.attempts = 2;

        let snapshot = job.snapshot();
        assert_eq!(snapshot.id, job.id);
        assert_eq!(snapshot.attempts, 2);
        assert_eq!(snapshot.error.as_deref(), Some("lease expired"));

        let receipt = EnqueueReceipt::from(&job);
        assert_eq!(
            serde_json::to_value(&receipt).expect("serialize")["status"],
            json!("queued")
        );
    }

    #[test]
    fn test_is_leased_by() {
        let mut job = Job::new("blend", json!({}));
        assert!(!job.is_leased_by("w1"));
        job.status = JobStatus::Running;
        job.lease_owner = Some("w1".to_string());
        assert!(job.is_leased_by("w1"));
        assert!(!job.is_leased_by("w2"));
    }
}
