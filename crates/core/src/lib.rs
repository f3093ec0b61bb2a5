//! `coffer-core` — shared ledger kernel.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the fixed-point [`Money`] amount type, the
//! ledger error taxonomy, and normalization of the timestamp shapes the
//! external record store produces.

pub mod error;
pub mod id;
pub mod money;
pub mod time;

pub use error::{LedgerError, LedgerResult};
pub use id::{AccountId, IdempotencyKey, JobId, RequestId};
pub use money::Money;
pub use time::StoredTimestamp;
