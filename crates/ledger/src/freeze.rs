//! Freeze window calculation.
//!
//! Newly charged funds are held off the standard withdrawal channel for a
//! configured number of minutes. The calculation here is a pure read over a
//! charge history snapshot: nothing is cached and nothing is persisted, so
//! the staleness window is exactly the read latency of the history itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use coffer_core::Money;

use crate::charge::ChargeEvent;

const DEFAULT_FREEZE_MINUTES: i64 = 30;

/// Configured hold duration, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FreezeWindow(i64);

impl FreezeWindow {
    pub const fn minutes(minutes: i64) -> Self {
        Self(if minutes < 0 { 0 } else { minutes })
    }

    /// Reads `FREEZE_WINDOW_MINUTES`; unset falls back to the default, a set
    /// but unparseable value is warned about before falling back.
    pub fn from_env() -> Self {
        match std::env::var("FREEZE_WINDOW_MINUTES") {
            Ok(raw) => match raw.parse::<i64>() {
                Ok(minutes) if minutes >= 0 => Self(minutes),
                _ => {
                    tracing::warn!(
                        value = %raw,
                        "FREEZE_WINDOW_MINUTES is not a non-negative integer; using {DEFAULT_FREEZE_MINUTES}"
                    );
                    Self(DEFAULT_FREEZE_MINUTES)
                }
            },
            Err(_) => Self(DEFAULT_FREEZE_MINUTES),
        }
    }

    pub fn as_minutes(&self) -> i64 {
        self.0
    }
}

impl Default for FreezeWindow {
    fn default() -> Self {
        Self(DEFAULT_FREEZE_MINUTES)
    }
}

/// Availability of a single charge at the evaluated instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeAvailability {
    pub amount: Money,
    pub available: bool,
    /// Minutes until this charge clears; zero once available.
    pub minutes_remaining: i64,
}

/// Result of one freeze evaluation. Derived, never persisted, never cached
/// across requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreezeSnapshot {
    pub frozen_total: Money,
    /// Minutes until the *last* currently-frozen charge clears; zero when
    /// nothing is frozen.
    pub minutes_until_next_unfreeze: i64,
    pub charges: Vec<ChargeAvailability>,
}

impl FreezeSnapshot {
    pub fn has_frozen_funds(&self) -> bool {
        self.frozen_total.is_positive()
    }
}

/// Evaluate the freeze window over a charge history at instant `now`.
///
/// A charge with a missing or unparseable timestamp counts as charged *now*
/// and is maximally frozen, and a future-dated charge is clamped the same
/// way: ambiguous age never resolves in the holder's favor.
pub fn compute_freeze(
    history: &[ChargeEvent],
    now: DateTime<Utc>,
    window: FreezeWindow,
) -> FreezeSnapshot {
    let window_minutes = window.as_minutes();
    let mut frozen_total = Money::ZERO;
    let mut minutes_until_next_unfreeze = 0i64;
    let mut charges = Vec::with_capacity(history.len());

    for charge in history {
        let minutes_elapsed = charge
            .occurred_at()
            .map(|at| (now - at).num_minutes().max(0))
            .unwrap_or(0);

        if minutes_elapsed < window_minutes {
            let minutes_remaining = window_minutes - minutes_elapsed;
            frozen_total += charge.amount;
            minutes_until_next_unfreeze = minutes_until_next_unfreeze.max(minutes_remaining);
            charges.push(ChargeAvailability {
                amount: charge.amount,
                available: false,
                minutes_remaining,
            });
        } else {
            charges.push(ChargeAvailability {
                amount: charge.amount,
                available: true,
                minutes_remaining: 0,
            });
        }
    }

    FreezeSnapshot {
        frozen_total,
        minutes_until_next_unfreeze,
        charges,
    }
}
