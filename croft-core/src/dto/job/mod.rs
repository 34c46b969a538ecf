//! Job DTOs for the submission and status contracts

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::{Job, JobStatus};

/// Response to a job submission
///
/// Work happens asynchronously; callers poll the status query with `job_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAccepted {
    pub job_id: Uuid,
    pub status: JobStatus,
}

impl From<&Job> for JobAccepted {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
        }
    }
}

/// Filter for listing jobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListJobs {
    pub status: Option<JobStatus>,
}
