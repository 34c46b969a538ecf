//! Log Repository
//!
//! Reads job log entries written by the runner.

use croft_core::domain::log::{LogEntry, LogLevel};
use sqlx::PgPool;
use uuid::Uuid;

/// Get all log entries for a job
pub async fn find_by_job(pool: &PgPool, job_id: Uuid) -> Result<Vec<LogEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LogRow>(
        r#"
        SELECT timestamp, level, message
        FROM job_logs
        WHERE job_id = $1
        ORDER BY timestamp ASC, id ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct LogRow {
    timestamp: chrono::DateTime<chrono::Utc>,
    level: String,
    message: String,
}

impl From<LogRow> for LogEntry {
    fn from(row: LogRow) -> Self {
        LogEntry {
            timestamp: row.timestamp,
            level: LogLevel::parse(&row.level),
            message: row.message,
        }
    }
}
