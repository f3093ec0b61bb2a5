//! Charge events: the credit side of the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use coffer_core::{AccountId, IdempotencyKey, Money, StoredTimestamp};

/// How a charge reached the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeMethod {
    /// Payment-gateway deposit (webhook confirmed).
    Gateway,
    /// Redeemed charge code.
    Code,
    /// Administrative credit, including merchant refunds.
    Admin,
}

/// One applied charge. Immutable once recorded; rows live in the
/// `charge_history` collection and are never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeEvent {
    pub user_id: AccountId,
    pub amount: Money,
    pub method: ChargeMethod,
    /// Legacy rows may lack a timestamp entirely; the freeze calculator
    /// treats those as charged just now.
    #[serde(default)]
    pub timestamp: Option<StoredTimestamp>,
    pub idempotency_key: IdempotencyKey,
}

impl ChargeEvent {
    /// A charge stamped in the canonical timestamp form.
    pub fn new(
        user_id: AccountId,
        amount: Money,
        method: ChargeMethod,
        idempotency_key: IdempotencyKey,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            amount,
            method,
            timestamp: Some(occurred_at.into()),
            idempotency_key,
        }
    }

    /// Normalized charge time, `None` when the row has no usable timestamp.
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_ref().and_then(StoredTimestamp::to_utc)
    }
}
