//! Ledger error model.

use thiserror::Error;

use crate::id::{IdempotencyKey, RequestId};
use crate::money::Money;

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// Every variant is a financial-integrity condition and must reach the
/// caller; none of these may be silently absorbed. Non-fatal encryption
/// degradation is logging, not an error, and does not appear here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A charge or withdrawal amount was zero or negative.
    #[error("invalid amount: {0}")]
    InvalidAmount(Money),

    /// The idempotency key was already applied for this account.
    #[error("duplicate charge: idempotency key {0} already applied")]
    DuplicateCharge(IdempotencyKey),

    /// Balance at approval time was below the requested amount.
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Money, requested: Money },

    /// The requested amount exceeds the chosen channel's availability.
    #[error("amount {requested} exceeds available {available}")]
    AmountExceedsAvailable { available: Money, requested: Money },

    /// A withdrawal request was mutated from a terminal state.
    #[error("invalid state transition: request is {from}, not pending")]
    InvalidStateTransition { from: String },

    /// No withdrawal request exists for the given id.
    #[error("withdrawal request not found: {0}")]
    RequestNotFound(RequestId),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The backing store failed (e.g. a poisoned lock). Infrastructure,
    /// not business outcome; still surfaced, never swallowed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn invalid_amount(amount: Money) -> Self {
        Self::InvalidAmount(amount)
    }

    pub fn duplicate_charge(key: IdempotencyKey) -> Self {
        Self::DuplicateCharge(key)
    }

    pub fn insufficient_funds(balance: Money, requested: Money) -> Self {
        Self::InsufficientFunds { balance, requested }
    }

    pub fn exceeds_available(available: Money, requested: Money) -> Self {
        Self::AmountExceedsAvailable {
            available,
            requested,
        }
    }

    pub fn invalid_transition(from: impl Into<String>) -> Self {
        Self::InvalidStateTransition { from: from.into() }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
