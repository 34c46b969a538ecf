//! Jobs repository
//!
//! Claims pending jobs and writes their terminal state. Every status change
//! is a single conditional statement, so concurrent workers never claim the
//! same job twice and never overwrite a terminal status.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use croft_core::domain::job::{Job, JobOutcome, JobStatus, JobType};
use sqlx::PgPool;
use uuid::Uuid;

/// Error recorded on jobs whose worker did not finish before its lease ran out
pub const LEASE_EXPIRED_MESSAGE: &str = "worker lease expired before the job finished";

/// Repository trait for job state transitions
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Claims the oldest pending job and marks it `running`
    ///
    /// Returns `None` when there is nothing to claim.
    async fn claim_next(
        &self,
        worker_id: &str,
        lease_expires_at: DateTime<Utc>,
    ) -> Result<Option<Job>>;

    /// Writes the terminal outcome of a running job
    ///
    /// Returns `false` if the job was no longer `running`.
    async fn finalize(&self, job_id: Uuid, outcome: &JobOutcome) -> Result<bool>;

    /// Fails every running job whose lease is past `now`, returning their ids
    async fn expire_leases(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>>;
}

/// Postgres implementation of JobRepository
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn claim_next(
        &self,
        worker_id: &str,
        lease_expires_at: DateTime<Utc>,
    ) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET status = 'running',
                started_at = NOW(),
                worker_id = $1,
                lease_expires_at = $2
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'pending'
                ORDER BY created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, job_type, status, created_at, started_at, completed_at,
                      worker_id, lease_expires_at, error_message, uri, message
            "#,
        )
        .bind(worker_id)
        .bind(lease_expires_at)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to claim pending job")?;

        row.map(Job::try_from).transpose()
    }

    async fn finalize(&self, job_id: Uuid, outcome: &JobOutcome) -> Result<bool> {
        let (message, uri, error_message) = match outcome {
            JobOutcome::Completed { message, uri } => (message.as_deref(), uri.as_deref(), None),
            JobOutcome::Failed { error_message } => (None, None, Some(error_message.as_str())),
        };

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2,
                completed_at = NOW(),
                message = $3,
                uri = $4,
                error_message = $5
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(outcome.status().as_str())
        .bind(message)
        .bind(uri)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to finalize job {}", job_id))?;

        Ok(result.rows_affected() == 1)
    }

    async fn expire_leases(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE jobs
            SET status = 'failed',
                completed_at = NOW(),
                error_message = $2 || ' (worker ' || COALESCE(worker_id, 'unknown') || ')'
            WHERE status = 'running' AND lease_expires_at < $1
            RETURNING id
            "#,
        )
        .bind(now)
        .bind(LEASE_EXPIRED_MESSAGE)
        .fetch_all(&self.pool)
        .await
        .context("Failed to expire job leases")?;

        Ok(ids)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    job_type: String,
    status: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    worker_id: Option<String>,
    lease_expires_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    uri: Option<String>,
    message: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = anyhow::Error;

    fn try_from(row: JobRow) -> Result<Self> {
        let job_type = JobType::parse(&row.job_type)
            .with_context(|| format!("Unknown job type '{}'", row.job_type))?;
        let status = JobStatus::parse(&row.status)
            .with_context(|| format!("Unknown job status '{}'", row.status))?;

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
