//! Job dispatch
//!
//! Routes a claimed job to the handler for its type.

use croft_core::domain::job::{Job, JobOutcome, JobStatus, JobType};
use std::sync::Arc;

use crate::error::DispatchError;
use crate::service::{ImportService, LogBufferService, ReportSynthesizer};

/// How a handler left the job it ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// The poller still has to write this outcome
    Finalize(JobOutcome),
    /// The handler completed the job in the transaction that stored its work
    Committed,
}

impl Handled {
    pub fn status(&self) -> JobStatus {
        match self {
            Handled::Finalize(outcome) => outcome.status(),
            Handled::Committed => JobStatus::Completed,
        }
    }
}

pub struct Dispatcher {
    import: ImportService,
    report: Arc<dyn ReportSynthesizer>,
}

impl Dispatcher {
    pub fn new(import: ImportService, report: Arc<dyn ReportSynthesizer>) -> Self {
        Self { import, report }
    }

    /// Runs the handler for `job`
    pub async fn dispatch(
        &self,
        job: &Job,
        logs: &dyn LogBufferService,
    ) -> Result<Handled, DispatchError> {
        match job.job_type {
            JobType::ProductionImport => {
                self.import.run(job.id, logs).await?;
                Ok(Handled::Committed)
            }
            JobType::InvestorReport => {
                let uri = self
                    .report
                    .synthesize(job.id)
                    .await
                    .map_err(DispatchError::Report)?;
                logs.info(format!("Report available at {}", uri));
                Ok(Handled::Finalize(JobOutcome::Completed {
                    message: None,
                    uri: Some(uri),
                }))
            }
        }
    }
}
