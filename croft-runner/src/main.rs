//! Croft Runner
//!
//! A worker that drains the job queue shared with the orchestrator.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: Postgres access to jobs, staged payloads, events and logs
//! - Services: Business logic (imports, report synthesis, log buffering)
//! - Scheduler: Job claiming, dispatch and finalization
//!
//! Any number of runners may share one database; each job is claimed by
//! exactly one of them.

mod config;
mod error;
mod repository;
mod scheduler;
mod service;

use anyhow::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::repository::{PgEventRepository, PgJobRepository, PgLogRepository, PgPayloadRepository};
use crate::scheduler::{Dispatcher, JobPoller};
use crate::service::{FileReportSynthesizer, ImportService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "croft_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Croft Runner");

    // Load configuration
    let config = Config::from_env();
    config.validate()?;
    info!(
        "Loaded configuration: worker_id={}, report_dir={}",
        config.worker_id,
        config.report_dir.display()
    );

    let pool = connect_with_retry(&config.database_url).await?;

    info!("Database connection pool created");

    // Initialize repositories and services
    let jobs = Arc::new(PgJobRepository::new(pool.clone()));
    let payloads = Arc::new(PgPayloadRepository::new(pool.clone()));
    let events = Arc::new(PgEventRepository::new(pool.clone()));
    let logs = Arc::new(PgLogRepository::new(pool));

    let import = ImportService::new(payloads.clone(), events.clone());
    let report = FileReportSynthesizer::new(
        events,
        config.report_dir.clone(),
        config.report_base_uri.clone(),
    );
    let dispatcher = Arc::new(Dispatcher::new(import, Arc::new(report)));

    info!("Services initialized");

    let poller = JobPoller::new(config, jobs, payloads, logs, dispatcher);

    // Start polling loop
    if let Err(e) = poller.run().await {
        error!("Poller error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Connects to the database with exponential backoff
///
/// The database may not be accepting connections yet when the runner starts
/// (common in container environments).
async fn connect_with_retry(database_url: &str) -> Result<PgPool> {
    const MAX_RETRIES: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                if attempt > 1 {
                    info!("Connected to database after {} attempt(s)", attempt);
                }
                return Ok(pool);
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    error!("Failed to connect to database after {} attempts", MAX_RETRIES);
                    return Err(anyhow::anyhow!("Failed to connect to database: {}", e));
                }

                warn!(
                    "Failed to connect to database (attempt {}/{}): {}",
                    attempt, MAX_RETRIES, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                // Exponential backoff with cap
                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}
