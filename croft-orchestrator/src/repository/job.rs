//! Job Repository
//!
//! Handles the orchestrator's database operations on jobs: creation and queries.
//! Status transitions after creation belong to the runner.

use croft_core::domain::job::{Job, JobStatus, JobType};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const MAX_LISTED_JOBS: i64 = 500;

/// Insert a freshly created job
pub async fn create<'e, E>(executor: E, job: &Job) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO jobs (id, job_type, status, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(job.id)
    .bind(job.job_type.as_str())
    .bind(job.status.as_str())
    .bind(job.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Find a job by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Job>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, job_type, status, created_at, started_at, completed_at,
               worker_id, lease_expires_at, error_message, uri, message
        FROM jobs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Job::try_from).transpose()
}

/// List jobs, newest first, optionally filtered by status
pub async fn list(pool: &PgPool, status: Option<JobStatus>) -> Result<Vec<Job>, sqlx::Error> {
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, job_type, status, created_at, started_at, completed_at,
               worker_id, lease_expires_at, error_message, uri, message
        FROM jobs
        WHERE ($1::VARCHAR IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(status.map(|s| s.as_str()))
    .bind(MAX_LISTED_JOBS)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Job::try_from).collect()
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    job_type: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
    worker_id: Option<String>,
    lease_expires_at: Option<chrono::DateTime<chrono::Utc>>,
    error_message: Option<String>,
    uri: Option<String>,
    message: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = sqlx::Error;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let job_type = JobType::parse(&row.job_type).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown job type '{}'", row.job_type).into())
        })?;
        let status = JobStatus::parse(&row.status).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown job status '{}'", row.status).into())
        })?;

        Ok(Job {
            id: row.id,
            job_type,
            status,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            worker_id: row.worker_id,
            lease_expires_at: row.lease_expires_at,
            error_message: row.error_message,
            uri: row.uri,
            message: row.message,
        })
    }
}
