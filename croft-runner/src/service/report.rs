//! Investor report synthesis
//!
//! Summarizes every stored production event by type and writes the summary
//! as a JSON artifact. The artifact is written to a temporary file and renamed
//! into place, so a returned URI always points at a complete document.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use croft_core::domain::production::EventSummary;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::repository::EventRepository;

/// Produces the artifact for an investor report job
#[async_trait]
pub trait ReportSynthesizer: Send + Sync {
    /// Builds the report for `job_id` and returns its URI
    async fn synthesize(&self, job_id: Uuid) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct InvestorReport {
    job_id: Uuid,
    generated_at: DateTime<Utc>,
    total_events: i64,
    event_types: Vec<EventSummary>,
}

/// Writes reports as `<report_dir>/<job_id>.json`
pub struct FileReportSynthesizer {
    events: Arc<dyn EventRepository>,
    report_dir: PathBuf,
    base_uri: String,
}

impl FileReportSynthesizer {
    pub fn new(events: Arc<dyn EventRepository>, report_dir: PathBuf, base_uri: String) -> Self {
        Self {
            events,
            report_dir,
            base_uri: base_uri.trim_end_matches('/').to_string(),
        }
    }

    fn file_name(job_id: Uuid) -> String {
        format!("{}.json", job_id)
    }
}

#[async_trait]
impl ReportSynthesizer for FileReportSynthesizer {
    async fn synthesize(&self, job_id: Uuid) -> Result<String> {
        let event_types = self.events.summarize().await?;

        let report = InvestorReport {
            job_id,
            generated_at: Utc::now(),
            total_events: event_types.iter().map(|s| s.count).sum(),
            event_types,
        };
        let body = serde_json::to_vec_pretty(&report).context("Failed to serialize report")?;

        tokio::fs::create_dir_all(&self.report_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.report_dir.display()))?;

        let file_name = Self::file_name(job_id);
        let final_path = self.report_dir.join(&file_name);
        let temp_path = self.report_dir.join(format!(".{}.tmp", file_name));

        tokio::fs::write(&temp_path, &body)
            .await
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;

        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e).with_context(|| format!("Failed to publish {}", final_path.display()));
        }

        info!(
            "Report for job {} written to {} ({} event types)",
            job_id,
            final_path.display(),
            report.event_types.len()
        );

        Ok(format!("{}/{}", self.base_uri, file_name))
    }
}
