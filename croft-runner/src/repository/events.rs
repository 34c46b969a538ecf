//! Production event repository
//!
//! Writes validated import batches and aggregates the stored events for
//! investor reports. An import batch is committed together with its job's
//! completion, so a job can never be `failed` while its rows are stored.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use croft_core::domain::production::{EventSummary, EventType, ProductionEvent};
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Stores an import batch and completes its job in one transaction
    ///
    /// Inserts every event, deletes the job's staged payload and marks the job
    /// `completed` with `message`. Nothing is written unless the job is still
    /// `running`.
    async fn commit_import(
        &self,
        job_id: Uuid,
        events: &[ProductionEvent],
        message: &str,
    ) -> Result<usize>;

    /// Per event type totals over all stored events, ordered by event type
    async fn summarize(&self) -> Result<Vec<EventSummary>>;
}

/// Postgres implementation of EventRepository
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn commit_import(
        &self,
        job_id: Uuid,
        events: &[ProductionEvent],
        message: &str,
    ) -> Result<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin import transaction")?;

        // Locks the job row until commit
        let completed = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed',
                completed_at = NOW(),
                message = $2
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(message)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to complete job {}", job_id))?;

        if completed.rows_affected() != 1 {
            anyhow::bail!("job {} is no longer running; batch discarded", job_id);
        }

        for (idx, event) in events.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO production_events
                    (id, job_id, species_id, event_type, occurred_at, quantity, notes, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(job_id)
            .bind(event.species_id)
            .bind(event.event_type.as_str())
            .bind(event.date)
            .bind(event.quantity)
            .bind(event.notes.as_deref())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert event {} of {}", idx + 1, events.len()))?;
        }

        sqlx::query("DELETE FROM staged_payloads WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to consume staged payload for job {}", job_id))?;

        // Dropping an uncommitted transaction rolls it back
        tx.commit()
            .await
            .context("Failed to commit import transaction")?;

        Ok(events.len())
    }

    async fn summarize(&self) -> Result<Vec<EventSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT event_type,
                   COUNT(*) AS count,
                   COALESCE(SUM(quantity), 0) AS quantity_total,
                   MIN(occurred_at) AS first_date,
                   MAX(occurred_at) AS last_date
            FROM production_events
            GROUP BY event_type
            ORDER BY event_type
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to summarize production events")?;

        rows.into_iter().map(EventSummary::try_from).collect()
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct SummaryRow {
    event_type: String,
    count: i64,
    quantity_total: f64,
    first_date: Option<DateTime<Utc>>,
    last_date: Option<DateTime<Utc>>,
}

impl TryFrom<SummaryRow> for EventSummary {
    type Error = anyhow::Error;

    fn try_from(row: SummaryRow) -> Result<Self> {
        let event_type = EventType::parse(&row.event_type)
            .with_context(|| format!("Unknown stored event type '{}'", row.event_type))?;

        Ok(EventSummary {
            event_type,
            count: row.count,
            quantity_total: row.quantity_total,
            first_date: row.first_date,
            last_date: row.last_date,
        })
    }
}
