//! Logs repository
//!
//! Persists job log entries. Buffering is handled by the service layer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use croft_core::domain::log::LogEntry;
use sqlx::PgPool;
use uuid::Uuid;

/// Repository trait for job log entries
#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Appends log entries to a job
    ///
    /// # Arguments
    /// * `job_id` - The ID of the job these logs belong to
    /// * `entries` - The log entries to store, in order
    async fn add_entries(&self, job_id: Uuid, entries: Vec<LogEntry>) -> Result<()>;
}

/// Postgres implementation of LogRepository
pub struct PgLogRepository {
    pool: PgPool,
}

impl PgLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogRepository for PgLogRepository {
    async fn add_entries(&self, job_id: Uuid, entries: Vec<LogEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for entry in &entries {
            sqlx::query(
                r#"
                INSERT INTO job_logs (job_id, timestamp, level, message)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(job_id)
            .bind(entry.timestamp)
            .bind(entry.level.as_str())
            .bind(&entry.message)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to store logs for job {}", job_id))?;
        }

        tx.commit().await?;

        Ok(())
    }
}
