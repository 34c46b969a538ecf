//! Job domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Asynchronous job record
///
/// Structure shared between orchestrator (creates, serves) and runner (claims, finalizes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub worker_id: Option<String>,
    pub lease_expires_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Set only when the job failed
    pub error_message: Option<String>,
    /// Set only for completed report jobs
    pub uri: Option<String>,
    /// Completion note (e.g. how many rows were rejected)
    pub message: Option<String>,
}

impl Job {
    /// Creates a fresh pending job
    pub fn pending(job_type: JobType) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type,
            status: JobStatus::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            worker_id: None,
            lease_expires_at: None,
            error_message: None,
            uri: None,
            message: None,
        }
    }
}

/// Kind of work a job performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    ProductionImport,
    InvestorReport,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::ProductionImport => "production_import",
            JobType::InvestorReport => "investor_report",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "production_import" => Some(JobType::ProductionImport),
            "investor_report" => Some(JobType::InvestorReport),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job lifecycle status
///
/// `Pending -> Running -> {Completed, Failed}`. Nothing ever returns to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal lifecycle step
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome written by the dispatch loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed {
        message: Option<String>,
        uri: Option<String>,
    },
    Failed {
        error_message: String,
    },
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed { .. } => JobStatus::Completed,
            JobOutcome::Failed { .. } => JobStatus::Failed,
        }
    }
}
