//! Job Service
//!
//! Business logic for job submission and status queries.

use croft_core::domain::job::{Job, JobType};
use croft_core::dto::job::ListJobs;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::repository::{job_repository, payload_repository};

/// Service error type
#[derive(Debug)]
pub enum JobError {
    NotFound(Uuid),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for JobError {
    fn from(err: sqlx::Error) -> Self {
        JobError::DatabaseError(err)
    }
}

/// Create a pending import job and stage its raw payload
///
/// The job row and the payload are written in one transaction, so the runner
/// never sees an import job without its payload unless the payload expired.
pub async fn submit_import(
    pool: &PgPool,
    content: String,
    payload_ttl: Duration,
) -> Result<Job, JobError> {
    validate_import_payload(&content)?;

    let job = Job::pending(JobType::ProductionImport);
    let expires_at = payload_expiry(job.created_at, payload_ttl)?;

    let mut tx = pool.begin().await?;
    job_repository::create(&mut *tx, &job).await?;
    payload_repository::stage(&mut *tx, job.id, &content, expires_at).await?;
    tx.commit().await?;

    tracing::info!(
        "Import job {} submitted ({} bytes staged)",
        job.id,
        content.len()
    );

    Ok(job)
}

/// Create a pending investor report job
pub async fn submit_report(pool: &PgPool) -> Result<Job, JobError> {
    let job = Job::pending(JobType::InvestorReport);

    job_repository::create(pool, &job).await?;

    tracing::info!("Report job {} submitted", job.id);

    Ok(job)
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<Job, JobError> {
    let job = job_repository::find_by_id(pool, id)
        .await?
        .ok_or(JobError::NotFound(id))?;

    Ok(job)
}

/// List jobs, newest first
pub async fn list_jobs(pool: &PgPool, filter: ListJobs) -> Result<Vec<Job>, JobError> {
    let jobs = job_repository::list(pool, filter.status).await?;
    Ok(jobs)
}

// =============================================================================
// Validation
// =============================================================================

fn validate_import_payload(content: &str) -> Result<(), JobError> {
    // Postgres TEXT cannot store NUL
    if content.contains('\0') {
        return Err(JobError::ValidationError(
            "Import payload must not contain NUL bytes".to_string(),
        ));
    }

    Ok(())
}

fn payload_expiry(
    created_at: chrono::DateTime<chrono::Utc>,
    ttl: Duration,
) -> Result<chrono::DateTime<chrono::Utc>, JobError> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| created_at.checked_add_signed(ttl))
        .ok_or_else(|| JobError::ValidationError(format!("Invalid payload TTL: {:?}", ttl)))
}
