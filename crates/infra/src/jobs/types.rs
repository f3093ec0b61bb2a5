//! Core job types and policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use coffer_core::JobId;

/// Job kind for routing to the appropriate handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Receipt email to the account holder after an approved withdrawal.
    InvoiceEmail,
    /// Operator notice that a withdrawal was approved.
    OwnerNotice,
    /// Generic/custom job
    Custom { kind: String },
}

impl JobKind {
    pub fn custom(kind: impl Into<String>) -> Self {
        Self::Custom { kind: kind.into() }
    }

    /// Dotted name used for handler routing and logs.
    pub fn type_name(&self) -> &str {
        match self {
            JobKind::InvoiceEmail => "notify.invoice_email",
            JobKind::OwnerNotice => "notify.owner",
            JobKind::Custom { kind } => kind,
        }
    }
}

/// Job execution status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, waiting to be picked up
    Pending,
    /// Currently being executed
    Running,
    /// Completed successfully
    Completed,
    /// Failed, will be retried
    Failed { error: String, attempt: u32 },
    /// Exhausted retries, moved to the dead-letter queue
    DeadLettered { error: String, attempts: u32 },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::DeadLettered { .. })
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, JobStatus::Failed { .. })
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^attempt
    Exponential,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (0 = never retry)
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Backoff strategy
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    /// Create a policy with fixed delays.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Create a policy with exponential backoff.
    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Calculate delay for a given attempt number (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;

        let delay_ms = match self.strategy {
            BackoffStrategy::Fixed => base_ms,
            BackoffStrategy::Exponential => base_ms
                .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
                .min(max_ms),
        };

        Duration::from_millis(delay_ms)
    }

    /// Check if more retries are allowed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// A background job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,
    /// Job kind for routing
    pub kind: JobKind,
    /// JSON payload
    pub payload: serde_json::Value,
    /// Current status
    pub status: JobStatus,
    /// Retry policy
    pub retry_policy: RetryPolicy,
    /// Current attempt number (starts at 0)
    pub attempt: u32,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When the job was last updated
    pub updated_at: DateTime<Utc>,
    /// When the job should next run; `None` means immediately
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Execution history (outcomes of previous attempts)
    #[serde(default)]
    pub history: Vec<JobAttemptRecord>,
}

/// Record of a job execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl Job {
    /// Create a new job.
    pub fn new(kind: JobKind, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            kind,
            payload,
            status: JobStatus::Pending,
            retry_policy: RetryPolicy::default(),
            attempt: 0,
            created_at: now,
            updated_at: now,
            scheduled_at: None,
            history: Vec::new(),
        }
    }

    /// Set a custom retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Check if the job is ready to execute.
    pub fn is_ready(&self) -> bool {
        match self.scheduled_at {
            Some(at) => Utc::now() >= at,
            None => true,
        }
    }

    /// Mark job as running.
    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.attempt += 1;
        self.updated_at = Utc::now();
    }

    /// Mark job as completed.
    pub fn mark_completed(&mut self, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.updated_at = now;
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            success: true,
            error: None,
            duration_ms: (now - started_at).num_milliseconds().max(0) as u64,
        });
    }

    /// Mark job as failed, scheduling a retry or dead-lettering per policy.
    pub fn mark_failed(&mut self, error: String, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.updated_at = now;
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            success: false,
            error: Some(error.clone()),
            duration_ms: (now - started_at).num_milliseconds().max(0) as u64,
        });

        if self.retry_policy.should_retry(self.attempt) {
            let delay = self.retry_policy.delay_for_attempt(self.attempt);
            self.scheduled_at = Some(now + chrono::Duration::from_std(delay).unwrap_or_default());
            self.status = JobStatus::Failed {
                error,
                attempt: self.attempt,
            };
        } else {
            self.status = JobStatus::DeadLettered {
                error,
                attempts: self.attempt,
            };
        }
    }
}

/// Entry in the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub job: Job,
    pub dead_lettered_at: DateTime<Utc>,
    pub reason: String,
}

impl DeadLetterEntry {
    pub fn new(job: Job, reason: String) -> Self {
        Self {
            job,
            dead_lettered_at: Utc::now(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let policy = RetryPolicy::exponential(
            8,
            Duration::from_millis(100),
            Duration::from_millis(1_500),
        );

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(1_500));
        assert_eq!(policy.delay_for_attempt(6), Duration::from_millis(1_500));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(500));

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..Default::default()
        };

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[test]
    fn kind_names_route_under_notify() {
        assert_eq!(JobKind::InvoiceEmail.type_name(), "notify.invoice_email");
        assert_eq!(JobKind::OwnerNotice.type_name(), "notify.owner");
        assert_eq!(JobKind::custom("reports.daily").type_name(), "reports.daily");
    }

    #[test]
    fn job_lifecycle() {
        let mut job = Job::new(JobKind::InvoiceEmail, serde_json::json!({"request_id": "r-1"}));

        assert!(matches!(job.status, JobStatus::Pending));
        assert_eq!(job.attempt, 0);
        assert!(job.is_ready());

        job.mark_running();
        assert!(matches!(job.status, JobStatus::Running));
        assert_eq!(job.attempt, 1);

        let started = Utc::now();
        job.mark_completed(started);
        assert!(matches!(job.status, JobStatus::Completed));
        assert_eq!(job.history.len(), 1);
        assert!(job.history[0].success);
    }

    #[test]
    fn job_failure_retries_then_dead_letters() {
        let mut job = Job::new(JobKind::OwnerNotice, serde_json::json!({}))
            .with_retry_policy(RetryPolicy {
                max_attempts: 2,
                ..Default::default()
            });

        job.mark_running();
        job.mark_failed("smtp timeout".to_string(), Utc::now());

        assert!(matches!(job.status, JobStatus::Failed { .. }));
        assert!(job.scheduled_at.is_some());
        assert!(job.status.is_retriable());

        job.mark_running();
        job.mark_failed("smtp timeout".to_string(), Utc::now());

        match &job.status {
            JobStatus::DeadLettered { error, attempts } => {
                assert_eq!(error, "smtp timeout");
                assert_eq!(*attempts, 2);
            }
            other => panic!("Expected DeadLettered, got {other:?}"),
        }
        assert!(job.status.is_terminal());
        assert_eq!(job.history.len(), 2);
    }
}
