//! Job API Handlers
//!
//! HTTP endpoints for job submission and status queries.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use croft_core::domain::job::Job;
use croft_core::domain::log::LogEntry;
use croft_core::dto::job::{JobAccepted, ListJobs};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::{job_service, log_service};

// =============================================================================
// Submission Endpoints
// =============================================================================

/// POST /jobs/import
/// Accept raw CSV text and enqueue a production import job
pub async fn submit_import(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    tracing::info!("Submitting import job ({} bytes)", body.len());

    let job = job_service::submit_import(&state.pool, body, state.payload_ttl).await?;

    Ok((StatusCode::ACCEPTED, Json(JobAccepted::from(&job))))
}

/// POST /jobs/report
/// Enqueue an investor report job
pub async fn submit_report(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    tracing::info!("Submitting report job");

    let job = job_service::submit_report(&state.pool).await?;

    Ok((StatusCode::ACCEPTED, Json(JobAccepted::from(&job))))
}

// =============================================================================
// Query Endpoints
// =============================================================================

/// GET /jobs/{id}
/// Get the current state of a job
pub async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting job: {}", id);

    let job = job_service::get_job(&state.pool, id).await?;

    Ok(Json(job))
}

/// GET /jobs
/// List jobs, optionally filtered with `?status=`
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(filter): Query<ListJobs>,
) -> ApiResult<Json<Vec<Job>>> {
    tracing::debug!("Listing jobs (status filter: {:?})", filter.status);

    let jobs = job_service::list_jobs(&state.pool, filter).await?;

    Ok(Json(jobs))
}

/// GET /jobs/{id}/logs
/// Get the log entries recorded while the job was processed
pub async fn get_job_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    tracing::debug!("Getting logs for job: {}", id);

    let logs = log_service::get_job_logs(&state.pool, id).await?;

    Ok(Json(logs))
}
