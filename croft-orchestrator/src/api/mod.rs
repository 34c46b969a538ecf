//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod job;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use sqlx::PgPool;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// How long a staged import payload is kept
    pub payload_ttl: Duration,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState, max_import_bytes: usize) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Submission endpoints
        .route(
            "/jobs/import",
            post(job::submit_import).layer(DefaultBodyLimit::max(max_import_bytes)),
        )
        .route("/jobs/report", post(job::submit_report))
        // Status endpoints
        .route("/jobs", get(job::list_jobs))
        .route("/jobs/{id}", get(job::get_job))
        .route("/jobs/{id}/logs", get(job::get_job_logs))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
