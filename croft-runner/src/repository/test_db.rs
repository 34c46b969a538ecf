//! Throwaway Postgres schema for the repository tests
//!
//! Tests using it are ignored by default. Run them with
//! `CROFT_TEST_DATABASE_URL=postgres://... cargo test -p croft-runner -- --ignored`.

use chrono::Utc;
use croft_core::domain::job::JobType;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE jobs (
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
    r#"
    CREATE TABLE staged_payloads (
        job_id UUID PRIMARY KEY REFERENCES jobs(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE production_events (
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
];

pub struct TestDb {
    pub pool: PgPool,
    admin: PgPool,
    schema: String,
}

impl TestDb {
    /// Creates a fresh schema holding the job tables
    pub async fn create() -> Self {
        let url = std::env::var("CROFT_TEST_DATABASE_URL")
            .expect("CROFT_TEST_DATABASE_URL must point at a Postgres database");
        let schema = format!("croft_test_{}", Uuid::new_v4().simple());

        let admin = PgPool::connect(&url).await.unwrap();
        sqlx::query(&format!("CREATE SCHEMA {}", schema))
            .execute(&admin)
            .await
            .unwrap();

        let search_path = format!("SET search_path TO {}", schema);
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .after_connect(move |conn, _meta| {
                let search_path = search_path.clone();
                Box::pin(async move {
                    conn.execute(search_path.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .unwrap();

        for table in TABLES {
            sqlx::query(table).execute(&pool).await.unwrap();
        }

        Self {
            pool,
            admin,
            schema,
        }
    }

    pub async fn teardown(self) {
        self.pool.close().await;
        sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .execute(&self.admin)
            .await
            .unwrap();
    }

    pub async fn insert_job(&self, job_type: JobType) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO jobs (id, job_type, status, created_at) VALUES ($1, $2, 'pending', $3)",
        )
        .bind(id)
        .bind(job_type.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .unwrap();
        id
    }

    pub async fn stage(&self, job_id: Uuid, content: &str) {
        sqlx::query(
            r#"
            INSERT INTO staged_payloads (job_id, content, created_at, expires_at)
            VALUES ($1, $2, NOW(), NOW() + INTERVAL '1 hour')
            "#,
        )
        .bind(job_id)
        .bind(content)
        .execute(&self.pool)
        .await
        .unwrap();
    }

    pub async fn status(&self, job_id: Uuid) -> String {
        sqlx::query_scalar("SELECT status FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn event_count(&self, job_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM production_events WHERE job_id = $1")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn has_payload(&self, job_id: Uuid) -> bool {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM staged_payloads WHERE job_id = $1)")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}
