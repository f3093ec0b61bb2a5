//! Storage and background-work infrastructure for the coffer ledger.
//!
//! The ledger store is the single consistency boundary: every balance
//! mutation happens inside one store call. The jobs runtime carries the
//! side effects of those mutations (receipt emails, operator notices) so
//! that a slow or failing channel can never fail the decision itself.

pub mod codes;
pub mod jobs;
pub mod store;

pub use codes::{TtlStore, VerificationCodes};
pub use jobs::{InMemoryJobStore, Job, JobExecutor, JobKind, JobStore};
pub use store::{InMemoryLedgerStore, LedgerStore};
