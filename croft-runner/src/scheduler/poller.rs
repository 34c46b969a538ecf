//! Job poller
//!
//! Claims one pending job per tick and runs it to a terminal state. The
//! handler runs in its own task, bounded by the job timeout, so a panic or a
//! hung handler fails the job instead of the loop. A handler that already
//! committed its job keeps that status even if the timeout fires afterwards.

use anyhow::{Context, Result};
use chrono::Utc;
use croft_core::domain::job::{Job, JobOutcome};
use std::sync::Arc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::DispatchError;
use crate::repository::{JobRepository, LogRepository, PayloadRepository};
use crate::scheduler::{Dispatcher, Handled};
use crate::service::{InMemoryLogBuffer, LogBufferService};

/// Job poller that continuously claims and executes jobs
pub struct JobPoller {
    config: Config,
    jobs: Arc<dyn JobRepository>,
    payloads: Arc<dyn PayloadRepository>,
    logs: Arc<dyn LogRepository>,
    dispatcher: Arc<Dispatcher>,
}

impl JobPoller {
    /// Creates a new job poller
    pub fn new(
        config: Config,
        jobs: Arc<dyn JobRepository>,
        payloads: Arc<dyn PayloadRepository>,
        logs: Arc<dyn LogRepository>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            config,
            jobs,
            payloads,
            logs,
            dispatcher,
        }
    }

    /// Starts the polling loop
    ///
    /// A tick always finishes before the next one starts.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting job poller (worker: {}, interval: {:?}, timeout: {:?})",
            self.config.worker_id, self.config.poll_interval, self.config.job_timeout
        );

        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            debug!("Polling for pending jobs");

            match self.tick().await {
                Ok(Some(job_id)) => debug!("Finished job {} this cycle", job_id),
                Ok(None) => debug!("No jobs available"),
                Err(e) => error!("Error during poll cycle: {:#}", e),
            }
        }
    }

    /// Performs a single poll cycle
    ///
    /// Returns the id of the job that was processed, if one was claimed.
    pub async fn tick(&self) -> Result<Option<Uuid>> {
        self.housekeeping().await;

        let lease = chrono::Duration::from_std(self.config.lease_duration())
            .context("Lease duration out of range")?;

        let Some(job) = self
            .jobs
            .claim_next(&self.config.worker_id, Utc::now() + lease)
            .await?
        else {
            return Ok(None);
        };

        info!("Claimed job {} ({})", job.id, job.job_type);

        let buffer = InMemoryLogBuffer::new();
        buffer.info(format!("Job claimed by worker {}", self.config.worker_id));

        let handled = match self.execute(&job, &buffer).await {
            Ok(handled) => handled,
            Err(e) => Handled::Finalize(JobOutcome::Failed {
                error_message: e.to_string(),
            }),
        };

        let finalized = match &handled {
            Handled::Committed => Ok(true),
            Handled::Finalize(outcome) => self.jobs.finalize(job.id, outcome).await,
        };

        match (&handled, &finalized) {
            (_, Ok(false)) => {
                warn!(
                    "Job {} was no longer running; its {} outcome was discarded",
                    job.id,
                    handled.status()
                );
                buffer.warning(format!(
                    "Job was already finalized; {} outcome discarded",
                    handled.status()
                ));
            }
            (Handled::Finalize(JobOutcome::Failed { error_message }), _) => {
                warn!("Job {} failed: {}", job.id, error_message);
                buffer.error(format!("Job failed: {}", error_message));
            }
            _ => {
                info!("Job {} completed", job.id);
                buffer.info("Job completed".to_string());
            }
        }

        let entries = buffer.drain();
        if let Err(e) = self.logs.add_entries(job.id, entries).await {
            warn!("Failed to store logs for job {}: {:#}", job.id, e);
        }

        finalized?;

        Ok(Some(job.id))
    }

    /// Runs the job's handler in its own task under the job timeout
    async fn execute(
        &self,
        job: &Job,
        buffer: &InMemoryLogBuffer,
    ) -> Result<Handled, DispatchError> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let task_job = job.clone();
        let task_buffer = buffer.clone();

        let mut handle =
            tokio::spawn(async move { dispatcher.dispatch(&task_job, &task_buffer).await });

        match time::timeout(self.config.job_timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(DispatchError::Panicked(panic_message(join_error))),
            Err(_) => {
                handle.abort();
                Err(DispatchError::TimedOut(self.config.job_timeout))
            }
        }
    }

    /// Fails jobs whose lease ran out and purges expired payloads
    ///
    /// Errors are logged and never stop the tick.
    async fn housekeeping(&self) {
        let now = Utc::now();

        match self.jobs.expire_leases(now).await {
            Ok(expired) => {
                for job_id in expired {
                    warn!("Job {} failed: worker lease expired", job_id);
                }
            }
            Err(e) => error!("Failed to expire job leases: {:#}", e),
        }

        match self.payloads.purge_expired(now).await {
            Ok(0) => {}
            Ok(purged) => info!("Purged {} expired staged payload(s)", purged),
            Err(e) => error!("Failed to purge staged payloads: {:#}", e),
        }
    }
}

fn panic_message(join_error: tokio::task::JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }

    let payload = join_error.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::EventRepository;
    use crate::repository::memory::MemoryStore;
    use crate::service::{FileReportSynthesizer, ImportService, ReportSynthesizer};
    use async_trait::async_trait;
    use croft_core::domain::job::{JobStatus, JobType};
    use croft_core::domain::log::LogLevel;
    use croft_core::domain::production::{EventSummary, ProductionEvent};
    use std::time::Duration;

    /// Commits through the store, then stalls before handing control back
    struct SlowAfterCommit {
        store: Arc<MemoryStore>,
        stall: Duration,
    }

    #[async_trait]
    impl EventRepository for SlowAfterCommit {
        async fn commit_import(
            &self,
            job_id: Uuid,
            events: &[ProductionEvent],
            message: &str,
        ) -> anyhow::Result<usize> {
            let imported = self.store.commit_import(job_id, events, message).await?;
            time::sleep(self.stall).await;
            Ok(imported)
        }

        async fn summarize(&self) -> anyhow::Result<Vec<EventSummary>> {
            self.store.summarize().await
        }
    }

    struct PanickingSynthesizer;

    #[async_trait]
    impl ReportSynthesizer for PanickingSynthesizer {
        async fn synthesize(&self, _job_id: Uuid) -> anyhow::Result<String> {
            panic!("synthesizer exploded");
        }
    }

    struct StalledSynthesizer;

    #[async_trait]
    impl ReportSynthesizer for StalledSynthesizer {
        async fn synthesize(&self, _job_id: Uuid) -> anyhow::Result<String> {
            time::sleep(Duration::from_secs(60)).await;
            Ok("never".to_string())
        }
    }

    struct FailingSynthesizer;

    #[async_trait]
    impl ReportSynthesizer for FailingSynthesizer {
        async fn synthesize(&self, _job_id: Uuid) -> anyhow::Result<String> {
            anyhow::bail!("disk full")
        }
    }

    fn test_config() -> Config {
        let mut config = Config::new("worker-test".to_string(), "postgres://unused".to_string());
        config.poll_interval = Duration::from_secs(1);
        config.job_timeout = Duration::from_secs(5);
        config
    }

    fn poller_with(
        store: &Arc<MemoryStore>,
        config: Config,
        report: Arc<dyn ReportSynthesizer>,
    ) -> JobPoller {
        let import = ImportService::new(store.clone(), store.clone());
        poller_from(store, config, import, report)
    }

    fn poller_from(
        store: &Arc<MemoryStore>,
        config: Config,
        import: ImportService,
        report: Arc<dyn ReportSynthesizer>,
    ) -> JobPoller {
        let dispatcher = Arc::new(Dispatcher::new(import, report));
        JobPoller::new(config, store.clone(), store.clone(), store.clone(), dispatcher)
    }

    fn poller(store: &Arc<MemoryStore>, report_dir: &std::path::Path) -> JobPoller {
        let report = FileReportSynthesizer::new(
            store.clone(),
            report_dir.to_path_buf(),
            "file:///reports".to_string(),
        );
        poller_with(store, test_config(), Arc::new(report))
    }

    #[tokio::test]
    async fn test_import_end_to_end() {
        let store = Arc::new(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let job_id = store.push_import(
            "species_id,event_type,date\n\
             11111111-1111-1111-1111-111111111111,Weight,2024-01-01\n\
             ,birth,2024-01-01",
        );
        assert_eq!(store.job(job_id).status, JobStatus::Pending);

        let processed = poller(&store, dir.path()).tick().await.unwrap();
        assert_eq!(processed, Some(job_id));

        let job = store.job(job_id);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.worker_id.as_deref(), Some("worker-test"));
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_some());
        assert!(job.error_message.is_none());
        assert!(job.uri.is_none());

        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, job_id);
        assert_eq!(events[0].1.event_type.as_str(), "weight");
        assert_eq!(events[0].1.date_iso(), "2024-01-01T00:00:00.000Z");

        let logs = store.logs(job_id);
        assert!(
            logs.iter()
                .any(|e| e.level == LogLevel::Warning && e.message.starts_with("Row 2: "))
        );
        assert!(!store.has_payload(job_id));
    }

    #[tokio::test]
    async fn test_partial_batch_commits_valid_rows() {
        let store = Arc::new(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let job_id = store.push_import(
            "species_id,event_type,date,quantity\n\
             11111111-1111-1111-1111-111111111111,birth,2024-01-01,1\n\
             22222222-2222-2222-2222-222222222222,birth,2024-01-01,-3\n\
             33333333-3333-3333-3333-333333333333,milk_volume,2024-01-02,20.5\n\
             44444444-4444-4444-4444-444444444444,weight,not-a-date,3\n\
             55555555-5555-5555-5555-555555555555,death,2024-01-03,\n",
        );

        poller(&store, dir.path()).tick().await.unwrap();

        let job = store.job(job_id);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(
            job.message.as_deref(),
            Some("Imported 3 of 5 rows; 2 rows rejected (see job logs)")
        );
        let species: Vec<_> = store
            .events()
            .iter()
            .map(|(_, e)| e.species_id.to_string())
            .collect();
        assert_eq!(
            species,
            vec![
                "11111111-1111-1111-1111-111111111111",
                "33333333-3333-3333-3333-333333333333",
                "55555555-5555-5555-5555-555555555555",
            ]
        );
    }

    #[tokio::test]
    async fn test_all_invalid_batch_fails_job() {
        let store = Arc::new(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let job_id = store.push_import("species_id,event_type,date\nnope,birth,2024-01-01\n");

        poller(&store, dir.path()).tick().await.unwrap();

        let job = store.job(job_id);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(
            job.error_message
                .as_deref()
                .unwrap()
                .starts_with("all 1 rows were rejected")
        );
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_completes_with_note() {
        let store = Arc::new(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let job_id = store.push_import("");

        poller(&store, dir.path()).tick().await.unwrap();

        let job = store.job(job_id);
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.message.is_some());
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_missing_payload_fails_job() {
        let store = Arc::new(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let job_id = store.push_job(JobType::ProductionImport);

        poller(&store, dir.path()).tick().await.unwrap();

        let job = store.job(job_id);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error_message,
            Some(format!("staged payload for job {} not found", job_id))
        );
    }

    #[tokio::test]
    async fn test_report_job_records_uri() {
        let store = Arc::new(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let job_id = store.push_job(JobType::InvestorReport);

        poller(&store, dir.path()).tick().await.unwrap();

        let job = store.job(job_id);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.uri, Some(format!("file:///reports/{}.json", job_id)));
        assert!(dir.path().join(format!("{}.json", job_id)).exists());
    }

    #[tokio::test]
    async fn test_report_error_fails_job() {
        let store = Arc::new(MemoryStore::new());
        let job_id = store.push_job(JobType::InvestorReport);

        poller_with(&store, test_config(), Arc::new(FailingSynthesizer))
            .tick()
            .await
            .unwrap();

        let job = store.job(job_id);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.uri.is_none());
        assert_eq!(
            job.error_message.as_deref(),
            Some("report generation failed: disk full")
        );
    }

    #[tokio::test]
    async fn test_panic_fails_job_and_loop_continues() {
        let store = Arc::new(MemoryStore::new());
        let panicking = store.push_job(JobType::InvestorReport);
        let poller = poller_with(&store, test_config(), Arc::new(PanickingSynthesizer));

        assert_eq!(poller.tick().await.unwrap(), Some(panicking));
        let job = store.job(panicking);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error_message.as_deref(),
            Some("job handler panicked: synthesizer exploded")
        );

        // The same poller keeps serving later jobs
        let import = store.push_import("species_id,event_type,date\n");
        assert_eq!(poller.tick().await.unwrap(), Some(import));
        assert_eq!(store.job(import).status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_timeout_fails_job() {
        let store = Arc::new(MemoryStore::new());
        let job_id = store.push_job(JobType::InvestorReport);
        let mut config = test_config();
        config.job_timeout = Duration::from_millis(50);

        poller_with(&store, config, Arc::new(StalledSynthesizer))
            .tick()
            .await
            .unwrap();

        let job = store.job(job_id);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.as_deref().unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn test_timeout_after_commit_keeps_import_completed() {
        let store = Arc::new(MemoryStore::new());
        let job_id = store.push_import(
            "species_id,event_type,date\n11111111-1111-1111-1111-111111111111,birth,2024-01-01\n",
        );
        let mut config = test_config();
        config.job_timeout = Duration::from_millis(100);
        let events = Arc::new(SlowAfterCommit {
            store: store.clone(),
            stall: Duration::from_millis(300),
        });
        let import = ImportService::new(store.clone(), events);

        poller_from(&store, config, import, Arc::new(FailingSynthesizer))
            .tick()
            .await
            .unwrap();

        let job = store.job(job_id);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.message.as_deref(), Some("Imported 1 rows"));
        assert!(job.error_message.is_none());
        assert_eq!(store.events().len(), 1);
        assert!(!store.has_payload(job_id));

        let last = store.logs(job_id).pop().unwrap();
        assert_eq!(last.level, LogLevel::Warning);
        assert_eq!(last.message, "Job was already finalized; failed outcome discarded");
    }

    #[tokio::test]
    async fn test_claims_oldest_pending_first() {
        let store = Arc::new(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let older = store.push_job(JobType::InvestorReport);
        let newer = store.push_job(JobType::InvestorReport);
        store.update_job(older, |j| j.created_at -= chrono::Duration::minutes(5));

        let poller = poller(&store, dir.path());
        assert_eq!(poller.tick().await.unwrap(), Some(older));
        assert_eq!(store.job(newer).status, JobStatus::Pending);
        assert_eq!(poller.tick().await.unwrap(), Some(newer));
        assert_eq!(poller.tick().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_claimed_job_cannot_be_claimed_again() {
        let store = Arc::new(MemoryStore::new());
        let job_id = store.push_job(JobType::InvestorReport);
        let lease = Utc::now() + chrono::Duration::minutes(5);

        let first = store.claim_next("worker-a", lease).await.unwrap();
        let second = store.claim_next("worker-b", lease).await.unwrap();

        assert_eq!(first.map(|j| j.id), Some(job_id));
        assert!(second.is_none());
        assert_eq!(store.job(job_id).worker_id.as_deref(), Some("worker-a"));
    }

    #[tokio::test]
    async fn test_terminal_status_is_not_overwritten() {
        let store = Arc::new(MemoryStore::new());
        let job_id = store.push_job(JobType::InvestorReport);
        store.update_job(job_id, |j| j.status = JobStatus::Failed);

        let outcome = JobOutcome::Completed {
            message: None,
            uri: Some("file:///late.json".to_string()),
        };
        assert!(!store.finalize(job_id, &outcome).await.unwrap());
        assert_eq!(store.job(job_id).status, JobStatus::Failed);
        assert!(store.job(job_id).uri.is_none());
    }

    #[tokio::test]
    async fn test_pending_job_cannot_be_finalized() {
        let store = Arc::new(MemoryStore::new());
        let job_id = store.push_job(JobType::ProductionImport);

        let outcome = JobOutcome::Failed {
            error_message: "never claimed".to_string(),
        };
        assert!(!store.finalize(job_id, &outcome).await.unwrap());
        assert_eq!(store.job(job_id).status, JobStatus::Pending);
        assert!(store.job(job_id).error_message.is_none());
    }

    #[tokio::test]
    async fn test_expired_lease_fails_stranded_job() {
        let store = Arc::new(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let stranded = store.push_job(JobType::InvestorReport);
        store.update_job(stranded, |j| {
            j.status = JobStatus::Running;
            j.worker_id = Some("worker-gone".to_string());
            j.lease_expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        });

        assert_eq!(poller(&store, dir.path()).tick().await.unwrap(), None);

        let job = store.job(stranded);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error_message.as_deref(),
            Some("worker lease expired before the job finished (worker worker-gone)")
        );
    }

    #[tokio::test]
    async fn test_housekeeping_purges_expired_payloads() {
        let store = Arc::new(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let job_id = store.push_job(JobType::ProductionImport);
        store.update_job(job_id, |j| j.status = JobStatus::Failed);
        store.stage(job_id, "", Utc::now() - chrono::Duration::hours(1));

        poller(&store, dir.path()).tick().await.unwrap();

        assert!(!store.has_payload(job_id));
    }

    #[tokio::test]
    async fn test_logs_are_flushed_after_finalization() {
        let store = Arc::new(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let job_id = store.push_job(JobType::ProductionImport);

        poller(&store, dir.path()).tick().await.unwrap();

        let logs = store.logs(job_id);
        assert_eq!(logs.first().unwrap().message, "Job claimed by worker worker-test");
        let last = logs.last().unwrap();
        assert_eq!(last.level, LogLevel::Error);
        assert!(last.message.starts_with("Job failed: staged payload"));
    }
}
