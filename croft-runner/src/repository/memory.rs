//! In-memory store used by the runner's tests
//!
//! Implements every repository trait over one mutex-guarded state, with the
//! same conditional semantics as the Postgres statements.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use croft_core::domain::job::{Job, JobOutcome, JobStatus, JobType};
use croft_core::domain::log::LogEntry;
use croft_core::domain::production::{EventSummary, ProductionEvent};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use super::jobs::LEASE_EXPIRED_MESSAGE;
use super::{EventRepository, JobRepository, LogRepository, PayloadRepository};

#[derive(Default)]
pub struct MemoryStore {
    jobs: Mutex<Vec<Job>>,
    payloads: Mutex<HashMap<Uuid, (String, DateTime<Utc>)>>,
    events: Mutex<Vec<(Uuid, ProductionEvent)>>,
    logs: Mutex<HashMap<Uuid, Vec<LogEntry>>>,
    fail_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pending job and returns its id
    pub fn push_job(&self, job_type: JobType) -> Uuid {
        let job = Job::pending(job_type);
        let id = job.id;
        self.jobs.lock().unwrap().push(job);
        id
    }

    /// Adds a pending import job with its payload staged for an hour
    pub fn push_import(&self, payload: &str) -> Uuid {
        let id = self.push_job(JobType::ProductionImport);
        self.stage(id, payload, Utc::now() + chrono::Duration::hours(1));
        id
    }

    pub fn stage(&self, job_id: Uuid, payload: &str, expires_at: DateTime<Utc>) {
        self.payloads
            .lock()
            .unwrap()
            .insert(job_id, (payload.to_string(), expires_at));
    }

    pub fn update_job(&self, job_id: Uuid, f: impl FnOnce(&mut Job)) {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.iter_mut().find(|j| j.id == job_id).unwrap();
        f(job);
    }

    pub fn job(&self, job_id: Uuid) -> Job {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == job_id)
            .cloned()
            .unwrap()
    }

    pub fn has_payload(&self, job_id: Uuid) -> bool {
        self.payloads.lock().unwrap().contains_key(&job_id)
    }

    pub fn events(&self) -> Vec<(Uuid, ProductionEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn logs(&self, job_id: Uuid) -> Vec<LogEntry> {
        self.logs
            .lock()
            .unwrap()
            .get(&job_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Stores events outside any job, for report tests
    pub fn seed_events(&self, events: &[ProductionEvent]) {
        let mut stored = self.events.lock().unwrap();
        stored.extend(events.iter().cloned().map(|e| (Uuid::nil(), e)));
    }

    /// Makes every following `commit_import` fail before anything is stored
    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn claim_next(
        &self,
        worker_id: &str,
        lease_expires_at: DateTime<Utc>,
    ) -> Result<Option<Job>> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs
            .iter_mut()
            .filter(|j| j.status.can_transition_to(JobStatus::Running))
            .min_by_key(|j| j.created_at)
        else {
            return Ok(None);
        };

        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        job.worker_id = Some(worker_id.to_string());
        job.lease_expires_at = Some(lease_expires_at);

        Ok(Some(job.clone()))
    }

    async fn finalize(&self, job_id: Uuid, outcome: &JobOutcome) -> Result<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status.can_transition_to(outcome.status()))
        else {
            return Ok(false);
        };

        job.status = outcome.status();
        job.completed_at = Some(Utc::now());
        match outcome {
            JobOutcome::Completed { message, uri } => {
                job.message = message.clone();
                job.uri = uri.clone();
            }
            JobOutcome::Failed { error_message } => {
                job.error_message = Some(error_message.clone());
            }
        }

        Ok(true)
    }

    async fn expire_leases(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let mut jobs = self.jobs.lock().unwrap();
        let mut expired = Vec::new();

        for job in jobs.iter_mut() {
            let lapsed = job.lease_expires_at.is_some_and(|lease| lease < now);
            if lapsed && job.status.can_transition_to(JobStatus::Failed) {
                job.status = JobStatus::Failed;
                job.completed_at = Some(now);
                job.error_message = Some(format!(
                    "{} (worker {})",
                    LEASE_EXPIRED_MESSAGE,
                    job.worker_id.as_deref().unwrap_or("unknown")
                ));
                expired.push(job.id);
            }
        }

        Ok(expired)
    }
}

#[async_trait]
impl PayloadRepository for MemoryStore {
    async fn fetch(&self, job_id: Uuid, now: DateTime<Utc>) -> Result<Option<String>> {
        Ok(self
            .payloads
            .lock()
            .unwrap()
            .get(&job_id)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(content, _)| content.clone()))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut payloads = self.payloads.lock().unwrap();
        let before = payloads.len();
        payloads.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - payloads.len()) as u64)
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn commit_import(
        &self,
        job_id: Uuid,
        events: &[ProductionEvent],
        message: &str,
    ) -> Result<usize> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            anyhow::bail!("insert rejected by store");
        }

        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status.can_transition_to(JobStatus::Completed))
        else {
            anyhow::bail!("job {} is no longer running; batch discarded", job_id);
        };

        job.status = JobStatus::Completed;
        job.completed_at = Some(Utc::now());
        job.message = Some(message.to_string());

        let mut stored = self.events.lock().unwrap();
        stored.extend(events.iter().cloned().map(|e| (job_id, e)));
        self.payloads.lock().unwrap().remove(&job_id);

        Ok(events.len())
    }

    async fn summarize(&self) -> Result<Vec<EventSummary>> {
        let mut by_type: BTreeMap<&str, EventSummary> = BTreeMap::new();
        let stored = self.events.lock().unwrap();

        for (_, event) in stored.iter() {
            let summary = by_type
                .entry(event.event_type.as_str())
                .or_insert_with(|| EventSummary {
                    event_type: event.event_type,
                    count: 0,
                    quantity_total: 0.0,
                    first_date: None,
                    last_date: None,
                });
            summary.count += 1;
            summary.quantity_total += event.quantity.unwrap_or(0.0);
            summary.first_date = Some(summary.first_date.map_or(event.date, |d| d.min(event.date)));
            summary.last_date = Some(summary.last_date.map_or(event.date, |d| d.max(event.date)));
        }

        Ok(by_type.into_values().collect())
    }
}

#[async_trait]
impl LogRepository for MemoryStore {
    async fn add_entries(&self, job_id: Uuid, entries: Vec<LogEntry>) -> Result<()> {
        self.logs
            .lock()
            .unwrap()
            .entry(job_id)
            .or_default()
            .extend(entries);
        Ok(())
    }
}
