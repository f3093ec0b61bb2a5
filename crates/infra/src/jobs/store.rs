//! Job storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use super::types::{DeadLetterEntry, Job, JobId, JobStatus};

/// Job store abstraction.
pub trait JobStore: Send + Sync {
    /// Enqueue a new job.
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError>;

    /// Get a job by ID.
    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Update a job.
    fn update(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Claim the next job that is ready to execute, marking it running.
    /// Returns `None` if no jobs are due.
    fn claim_next(&self) -> Result<Option<Job>, JobStoreError>;

    /// Move a job to the dead-letter queue.
    fn dead_letter(&self, job: Job, reason: String) -> Result<(), JobStoreError>;

    /// List dead-lettered jobs, oldest first.
    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError>;

    /// Retry a dead-lettered job (move back to pending).
    fn retry_dead_letter(&self, job_id: JobId) -> Result<Job, JobStoreError>;

    /// Get job statistics.
    fn stats(&self) -> Result<JobStats, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Job statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

/// In-memory job store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    dead_letters: RwLock<HashMap<JobId, DeadLetterEntry>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read_jobs(&self) -> Result<RwLockReadGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs
            .read()
            .map_err(|_| JobStoreError::Storage("job store lock poisoned".to_string()))
    }

    fn write_jobs(&self) -> Result<RwLockWriteGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs
            .write()
            .map_err(|_| JobStoreError::Storage("job store lock poisoned".to_string()))
    }

    fn read_dead_letters(
        &self,
    ) -> Result<RwLockReadGuard<'_, HashMap<JobId, DeadLetterEntry>>, JobStoreError> {
        self.dead_letters
            .read()
            .map_err(|_| JobStoreError::Storage("dead-letter lock poisoned".to_string()))
    }

    fn write_dead_letters(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<JobId, DeadLetterEntry>>, JobStoreError> {
        self.dead_letters
            .write()
            .map_err(|_| JobStoreError::Storage("dead-letter lock poisoned".to_string()))
    }
}

impl JobStore for InMemoryJobStore {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        let mut jobs = self.write_jobs()?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        Ok(self.read_jobs()?.get(&job_id).cloned())
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut jobs = self.write_jobs()?;
        if !jobs.contains_key(&job.id) {
            return Err(JobStoreError::NotFound(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        let mut jobs = self.write_jobs()?;

        // Oldest ready job wins; retries re-enter the same FIFO.
        let next_id = jobs
            .values()
            .filter(|j| {
                matches!(j.status, JobStatus::Pending | JobStatus::Failed { .. }) && j.is_ready()
            })
            .min_by_key(|j| j.created_at)
            .map(|j| j.id);

        if let Some(job_id) = next_id {
            if let Some(job) = jobs.get_mut(&job_id) {
                job.mark_running();
                return Ok(Some(job.clone()));
            }
        }

        Ok(None)
    }

    fn dead_letter(&self, mut job: Job, reason: String) -> Result<(), JobStoreError> {
        let mut jobs = self.write_jobs()?;
        let mut dls = self.write_dead_letters()?;

        job.status = JobStatus::DeadLettered {
            error: reason.clone(),
            attempts: job.attempt,
        };
        job.updated_at = Utc::now();

        jobs.remove(&job.id);
        dls.insert(job.id, DeadLetterEntry::new(job, reason));

        Ok(())
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        let dls = self.read_dead_letters()?;
        let mut result: Vec<_> = dls.values().cloned().collect();
        result.sort_by_key(|e| e.dead_lettered_at);
        result.truncate(limit);
        Ok(result)
    }

    fn retry_dead_letter(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        let mut jobs = self.write_jobs()?;
        let mut dls = self.write_dead_letters()?;

        let entry = dls.remove(&job_id).ok_or(JobStoreError::NotFound(job_id))?;

        let mut job = entry.job;
        job.status = JobStatus::Pending;
        job.attempt = 0;
        job.scheduled_at = None;
        job.updated_at = Utc::now();
        job.history.clear();

        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        let jobs = self.read_jobs()?;
        let dls = self.read_dead_letters()?;

        let mut stats = JobStats::default();
        for job in jobs.values() {
            match &job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed { .. } => stats.failed += 1,
                JobStatus::DeadLettered { .. } => stats.dead_lettered += 1,
            }
        }
        stats.dead_lettered += dls.len();

        Ok(stats)
    }
}

impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        (**self).enqueue(job)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        (**self).get(job_id)
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        (**self).update(job)
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        (**self).claim_next()
    }

    fn dead_letter(&self, job: Job, reason: String) -> Result<(), JobStoreError> {
        (**self).dead_letter(job, reason)
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        (**self).list_dead_letters(limit)
    }

    fn retry_dead_letter(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        (**self).retry_dead_letter(job_id)
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        (**self).stats()
    }
}
