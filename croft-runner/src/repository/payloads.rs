//! Staged payload repository
//!
//! Reads the raw import payloads the orchestrator staged at submission time
//! and purges the ones nobody consumed. A successful import deletes its
//! payload inside the import transaction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait PayloadRepository: Send + Sync {
    /// Raw payload staged for `job_id`, if present and not yet expired at `now`
    async fn fetch(&self, job_id: Uuid, now: DateTime<Utc>) -> Result<Option<String>>;

    /// Removes payloads past their expiry, returning how many were removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Postgres implementation of PayloadRepository
pub struct PgPayloadRepository {
    pool: PgPool,
}

impl PgPayloadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PayloadRepository for PgPayloadRepository {
    async fn fetch(&self, job_id: Uuid, now: DateTime<Utc>) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT content FROM staged_payloads WHERE job_id = $1 AND expires_at > $2",
        )
        .bind(job_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to fetch staged payload for job {}", job_id))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM staged_payloads WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to purge expired staged payloads")?;

        Ok(result.rows_affected())
    }
}
