//! Ledger persistence boundary.
//!
//! Defines the storage abstraction for accounts, charge history, and
//! withdrawal requests without making storage assumptions, plus the
//! in-memory implementation used by tests and single-process deployments.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use r#trait::LedgerStore;
