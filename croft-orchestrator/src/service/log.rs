//! Log Service
//!
//! Business logic for reading job logs.

use croft_core::domain::log::LogEntry;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::{job_repository, log_repository};

/// Service error type
#[derive(Debug)]
pub enum LogError {
    JobNotFound(Uuid),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for LogError {
    fn from(err: sqlx::Error) -> Self {
        LogError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, LogError>;

/// Get all log entries for a job
pub async fn get_job_logs(pool: &PgPool, job_id: Uuid) -> Result<Vec<LogEntry>> {
    if job_repository::find_by_id(pool, job_id).await?.is_none() {
        return Err(LogError::JobNotFound(job_id));
    }

    let logs = log_repository::find_by_job(pool, job_id).await?;

    tracing::debug!("Loaded {} log entries for job: {}", logs.len(), job_id);

    Ok(logs)
}
