//! Health Check API Handler
//!
//! Reports whether the orchestrator can reach its database.

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::api::AppState;

/// GET /health
/// `200 OK` when the job store answers, `503` otherwise
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}
