use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id UUID PRIMARY KEY,
            job_type VARCHAR(50) NOT NULL,
            status VARCHAR(20) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            worker_id VARCHAR(255),
            lease_expires_at TIMESTAMPTZ,
            error_message TEXT,
            uri TEXT,
            message TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Raw import payloads, consumed once by the worker
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staged_payloads (
            job_id UUID PRIMARY KEY REFERENCES jobs(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create production events table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS production_events (
            id UUID PRIMARY KEY,
            job_id UUID REFERENCES jobs(id) ON DELETE SET NULL,
            species_id UUID NOT NULL,
            event_type VARCHAR(50) NOT NULL,
            occurred_at TIMESTAMPTZ NOT NULL,
            quantity DOUBLE PRECISION,
            notes TEXT,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create logs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_logs (
            id SERIAL PRIMARY KEY,
            job_id UUID NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            timestamp TIMESTAMPTZ NOT NULL,
            level VARCHAR(20) NOT NULL,
            message TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The claim query scans pending jobs oldest first
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status_created_at ON jobs(status, created_at)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at DESC)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_staged_payloads_expires_at ON staged_payloads(expires_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_production_events_type ON production_events(event_type, occurred_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_logs_job_id ON job_logs(job_id, timestamp)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
