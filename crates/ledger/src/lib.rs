//! `coffer-ledger` — ledger domain model.
//!
//! The record shapes the store persists (charges, withdrawal requests,
//! accounts), the withdrawal state machine, and the pure freeze-window
//! calculation. No storage and no I/O here; `coffer-infra` owns persistence
//! and `coffer-service` owns orchestration.

pub mod account;
pub mod charge;
pub mod freeze;
pub mod withdrawal;

pub use account::AccountRecord;
pub use charge::{ChargeEvent, ChargeMethod};
pub use freeze::{ChargeAvailability, FreezeSnapshot, FreezeWindow, compute_freeze};
pub use withdrawal::{Destination, WithdrawalRequest, WithdrawalStatus};
