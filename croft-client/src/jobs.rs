//! Job-related API endpoints

use croft_core::domain::job::{Job, JobStatus};
use croft_core::domain::log::LogEntry;
use croft_core::dto::job::JobAccepted;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::OrchestratorClient;
use crate::error::{ClientError, Result};

impl OrchestratorClient {
    // =============================================================================
    // Submission
    // =============================================================================

    /// Submit raw CSV text as a production import job
    ///
    /// The orchestrator only stages the payload; rows are validated when a
    /// runner picks the job up.
    pub async fn submit_import(&self, csv: String) -> Result<JobAccepted> {
        let url = format!("{}/jobs/import", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/csv; charset=utf-8")
            .body(csv)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Submit an investor report job
    pub async fn submit_report(&self) -> Result<JobAccepted> {
        let url = format!("{}/jobs/report", self.base_url);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Status
    // =============================================================================

    /// Get a job by ID
    pub async fn get_job(&self, job_id: Uuid) -> Result<Job> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List jobs, newest first
    ///
    /// # Arguments
    /// * `status` - Only return jobs in this status
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let url = format!("{}/jobs", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }

    /// Get the log entries recorded while a job was processed
    pub async fn get_job_logs(&self, job_id: Uuid) -> Result<Vec<LogEntry>> {
        let url = format!("{}/jobs/{}/logs", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Poll a job until it is `completed` or `failed`
    ///
    /// # Arguments
    /// * `job_id` - The job UUID
    /// * `poll_interval` - Delay between status queries
    /// * `timeout` - Give up after this long; `None` waits indefinitely
    pub async fn wait_for_job(
        &self,
        job_id: Uuid,
        poll_interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<Job> {
        let started = Instant::now();

        loop {
            let job = self.get_job(job_id).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }

            tracing::debug!("Job {} is {}, waiting", job_id, job.status);

            if let Some(timeout) = timeout {
                if started.elapsed() + poll_interval > timeout {
                    return Err(ClientError::Timeout {
                        job_id,
                        waited: started.elapsed(),
                    });
                }
            }

            tokio::time::sleep(poll_interval).await;
        }
    }
}
