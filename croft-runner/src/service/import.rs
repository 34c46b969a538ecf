//! Production import service
//!
//! Turns a staged CSV payload into stored production events: parse, validate
//! every row, then write the valid subset in one transaction that also
//! completes the job.

use chrono::Utc;
use croft_core::import::{self, BatchValidation};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::repository::{EventRepository, PayloadRepository};
use crate::service::LogBufferService;

/// How many rejected rows are quoted in the error of an all-rejected batch
const REJECTIONS_IN_SUMMARY: usize = 3;

pub struct ImportService {
    payloads: Arc<dyn PayloadRepository>,
    events: Arc<dyn EventRepository>,
}

impl ImportService {
    pub fn new(payloads: Arc<dyn PayloadRepository>, events: Arc<dyn EventRepository>) -> Self {
        Self { payloads, events }
    }

    /// Imports the payload staged for `job_id`
    ///
    /// On success the job is already `completed` and the returned note is its
    /// message. Rejected rows are written to `logs`, one entry per row.
    pub async fn run(
        &self,
        job_id: Uuid,
        logs: &dyn LogBufferService,
    ) -> Result<String, DispatchError> {
        let now = Utc::now();

        let payload = self
            .payloads
            .fetch(job_id, now)
            .await
            .map_err(DispatchError::Import)?
            .ok_or(DispatchError::MissingPayload(job_id))?;

        let rows = import::parse_rows(&payload)
            .map_err(|e| DispatchError::MalformedPayload(e.to_string()))?;

        let batch = import::validate_batch(&rows, now);
        debug!(
            "Job {}: {} rows, {} valid, {} rejected",
            job_id,
            batch.total(),
            batch.valid.len(),
            batch.rejected.len()
        );
        logs.info(format!("Parsed {} rows from staged payload", batch.total()));

        for rejection in &batch.rejected {
            logs.warning(rejection.to_string());
        }

        if batch.all_rejected() {
            return Err(DispatchError::AllRowsRejected {
                count: batch.total(),
                summary: rejection_summary(&batch),
            });
        }

        let note = completion_note(&batch);
        let imported = self
            .events
            .commit_import(job_id, &batch.valid, &note)
            .await
            .map_err(DispatchError::Import)?;

        info!("Job {}: imported {} production events", job_id, imported);
        logs.info(format!("Imported {} production events", imported));

        Ok(note)
    }
}

fn completion_note(batch: &BatchValidation) -> String {
    if batch.is_empty() {
        "Payload contained no rows; nothing imported".to_string()
    } else if batch.rejected.is_empty() {
        format!("Imported {} rows", batch.valid.len())
    } else {
        format!(
            "Imported {} of {} rows; {} rows rejected (see job logs)",
            batch.valid.len(),
            batch.total(),
            batch.rejected.len()
        )
    }
}

fn rejection_summary(batch: &BatchValidation) -> String {
    let mut summary = batch
        .rejected
        .iter()
        .take(REJECTIONS_IN_SUMMARY)
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(" | ");

    let remaining = batch.rejected.len().saturating_sub(REJECTIONS_IN_SUMMARY);
    if remaining > 0 {
        summary.push_str(&format!(" | and {} more", remaining));
    }

    summary
}
