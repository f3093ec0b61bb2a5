//! Background job system with retry, backoff, and dead-letter handling.
//!
//! ## Design
//!
//! - Jobs carry a JSON payload and a typed kind for handler routing
//! - Retry policy with exponential backoff
//! - Dead-letter queue for failed jobs after max retries
//! - Visibility into job status and failures
//!
//! ## Components
//!
//! - `Job`: Core job abstraction with payload and metadata
//! - `JobStore`: Persistence for jobs (in-memory or durable)
//! - `JobExecutor`: Runs jobs with retry logic
//! - `DeadLetterEntry`: Failed jobs held for inspection/replay

pub mod executor;
pub mod store;
pub mod types;

pub use executor::{ExecutorStats, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobHandler};
pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{
    BackoffStrategy, DeadLetterEntry, Job, JobAttemptRecord, JobId, JobKind, JobStatus, RetryPolicy,
};
