//! Withdrawal eligibility and orchestration for the coffer ledger.
//!
//! External surfaces (bot, admin console, webhooks) talk to a
//! `WithdrawalService`: availability and quoting on the read side,
//! submission and the approval lifecycle on the write side. The service
//! owns no state of its own; the store it wraps is the single consistency
//! boundary, and approval side effects leave through the notifier seam.

pub mod fees;
pub mod notify;
pub mod service;

pub use fees::{ConfigError, FeeSchedule, Quote, WithdrawalChannel};
pub use notify::{ApprovalNotice, ApprovalNotifier, NoopNotifier, NotifyError, QueueNotifier};
pub use service::{Availability, WithdrawalService};
