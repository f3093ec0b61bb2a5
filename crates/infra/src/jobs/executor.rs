//! Job executor with retry and backoff logic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::store::{JobStore, JobStoreError};
use super::types::{Job, JobKind, JobStatus};

/// Job handler function type.
///
/// A returned error fails the attempt; the job is retried per its policy
/// with the anyhow context chain preserved in the attempt history.
pub type JobHandler = Box<dyn Fn(&Job) -> anyhow::Result<()> + Send + Sync>;

/// Job executor configuration.
#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// How often to poll for new jobs
    pub poll_interval: Duration,
    /// Name for logging
    pub name: String,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            name: "job-executor".to_string(),
        }
    }
}

impl JobExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Handle to control a running executor.
#[derive(Debug)]
pub struct JobExecutorHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl JobExecutorHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    /// Get current executor statistics.
    pub fn stats(&self) -> ExecutorStats {
        self.stats.lock().unwrap().clone()
    }
}

/// Executor runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutorStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_dead_lettered: u64,
    pub uptime_secs: u64,
}

/// Background job executor.
///
/// Polls a job store for due jobs, executes them with registered handlers,
/// and applies retry and dead-letter policy. One worker thread is enough:
/// the queue carries notification traffic, not ingest traffic.
pub struct JobExecutor<S: JobStore> {
    store: S,
    handlers: HashMap<String, JobHandler>,
}

impl<S: JobStore + 'static> JobExecutor<S> {
    /// Create a new executor with the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a job kind pattern.
    ///
    /// Patterns match a kind's dotted name exactly, by category
    /// (`notify.*`), or by the `*` catch-all.
    pub fn register_handler<F>(&mut self, kind_pattern: impl Into<String>, handler: F)
    where
        F: Fn(&Job) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(kind_pattern.into(), Box::new(handler));
    }

    /// Get the handler for a job kind.
    fn get_handler(&self, kind: &JobKind) -> Option<&JobHandler> {
        let type_name = kind.type_name();
        if let Some(h) = self.handlers.get(type_name) {
            return Some(h);
        }

        // Category match (e.g. "notify.*" matches "notify.invoice_email")
        for (pattern, handler) in &self.handlers {
            if let Some(prefix) = pattern.strip_suffix(".*") {
                if type_name.starts_with(prefix) {
                    return Some(handler);
                }
            }
        }

        self.handlers.get("*")
    }

    /// Execute a claimed job (for testing or synchronous use).
    ///
    /// Updates the store with the outcome and moves exhausted jobs to the
    /// dead-letter queue. `Err` carries the failure message.
    pub fn execute_one(&self, job: &mut Job) -> Result<(), String> {
        let started = Utc::now();

        let outcome = match self.get_handler(&job.kind) {
            Some(handler) => handler(job).map_err(|e| format!("{e:#}")),
            None => Err(format!("no handler for job kind: {:?}", job.kind)),
        };

        match outcome {
            Ok(()) => {
                job.mark_completed(started);
                self.store.update(job).map_err(|e| e.to_string())?;
                debug!(job_id = %job.id, "job completed");
                Ok(())
            }
            Err(failure) => {
                job.mark_failed(failure.clone(), started);
                self.store.update(job).map_err(|e| e.to_string())?;

                if matches!(job.status, JobStatus::DeadLettered { .. }) {
                    warn!(job_id = %job.id, error = %failure, "job dead-lettered");
                    if let Err(e) = self.store.dead_letter(job.clone(), failure.clone()) {
                        error!(job_id = %job.id, error = ?e, "failed to dead-letter job");
                    }
                }

                Err(failure)
            }
        }
    }

    /// Claim and execute jobs until none are due. Returns how many ran.
    ///
    /// Synchronous drain for tests and shutdown paths; failures are
    /// recorded in the store, not returned.
    pub fn run_pending(&self) -> Result<usize, JobStoreError> {
        let mut processed = 0;
        while let Some(mut job) = self.store.claim_next()? {
            let _ = self.execute_one(&mut job);
            processed += 1;
        }
        Ok(processed)
    }

    /// Spawn the executor in a background thread.
    pub fn spawn(self, config: JobExecutorConfig) -> JobExecutorHandle
    where
        S: Send,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(ExecutorStats::default()));
        let stats_clone = stats.clone();

        let name = config.name.clone();
        let join = thread::Builder::new()
            .name(name)
            .spawn(move || {
                executor_loop(self, config, shutdown_rx, stats_clone);
            })
            .expect("failed to spawn job executor thread");

        JobExecutorHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        }
    }
}

fn executor_loop<S: JobStore + 'static>(
    executor: JobExecutor<S>,
    config: JobExecutorConfig,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<ExecutorStats>>,
) {
    info!(executor = %config.name, "job executor started");
    let start_time = Instant::now();

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        {
            let mut s = stats.lock().unwrap();
            s.uptime_secs = start_time.elapsed().as_secs();
        }

        match executor.store.claim_next() {
            Ok(Some(mut job)) => {
                debug!(
                    executor = %config.name,
                    job_id = %job.id,
                    kind = ?job.kind,
                    "claimed job"
                );

                let result = executor.execute_one(&mut job);

                let mut s = stats.lock().unwrap();
                s.jobs_processed += 1;
                match result {
                    Ok(()) => s.jobs_succeeded += 1,
                    Err(_) => {
                        s.jobs_failed += 1;
                        if matches!(job.status, JobStatus::DeadLettered { .. }) {
                            s.jobs_dead_lettered += 1;
                        }
                    }
                }
            }
            Ok(None) => {
                thread::sleep(config.poll_interval);
            }
            Err(e) => {
                error!(executor = %config.name, error = ?e, "failed to claim job");
                thread::sleep(config.poll_interval);
            }
        }
    }

    info!(executor = %config.name, "job executor stopped");
}
