//! Staged Payload Repository
//!
//! Writes raw import payloads keyed by job id. The runner consumes and deletes them.

use sqlx::PgExecutor;
use uuid::Uuid;

/// Stage the raw payload for an import job
pub async fn stage<'e, E>(
    executor: E,
    job_id: Uuid,
    content: &str,
    expires_at: chrono::DateTime<chrono::Utc>,
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO staged_payloads (job_id, content, created_at, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(job_id)
    .bind(content)
    .bind(chrono::Utc::now())
    .bind(expires_at)
    .execute(executor)
    .await?;

    Ok(())
}
