//! Dispatch errors
//!
//! Every variant ends the job as `failed`, with the rendered error as its
//! `error_message`.

use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("staged payload for job {0} not found")]
    MissingPayload(Uuid),

    #[error("malformed import payload: {0}")]
    MalformedPayload(String),

    #[error("all {count} rows were rejected: {summary}")]
    AllRowsRejected { count: usize, summary: String },

    #[error("import failed: {0:#}")]
    Import(anyhow::Error),

    #[error("report generation failed: {0:#}")]
    Report(anyhow::Error),

    #[error("job handler panicked: {0}")]
    Panicked(String),

    #[error("job exceeded the {0:?} timeout")]
    TimedOut(Duration),
}
