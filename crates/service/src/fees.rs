//! Withdrawal channels and the fee schedule.
//!
//! Two payout channels exist: `Standard` respects the freeze window at the
//! lower rate, `Instant` skips it at the higher rate. The schedule is
//! validated at construction so a quote can never be produced from a
//! nonsensical rate table.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use coffer_core::Money;

/// Payout channel for a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalChannel {
    Standard,
    Instant,
}

impl WithdrawalChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalChannel::Standard => "standard",
            WithdrawalChannel::Instant => "instant",
        }
    }
}

impl core::fmt::Display for WithdrawalChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected fee-schedule configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("fee percentage {0} is outside 0..=100")]
    PercentageOutOfRange(Decimal),

    #[error("standard rate {standard} exceeds instant rate {instant}")]
    StandardAboveInstant { standard: Decimal, instant: Decimal },
}

fn default_standard_pct() -> Decimal {
    Decimal::new(55, 1) // 5.5
}

fn default_instant_pct() -> Decimal {
    Decimal::from(8)
}

/// Fee percentage per channel.
///
/// The instant channel waives the freeze window, so its rate must be at
/// least the standard rate; both must sit within 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    standard_pct: Decimal,
    instant_pct: Decimal,
}

impl FeeSchedule {
    pub fn new(standard_pct: Decimal, instant_pct: Decimal) -> Result<Self, ConfigError> {
        for pct in [standard_pct, instant_pct] {
            if pct < Decimal::ZERO || pct > Decimal::from(100) {
                return Err(ConfigError::PercentageOutOfRange(pct));
            }
        }
        if standard_pct > instant_pct {
            return Err(ConfigError::StandardAboveInstant {
                standard: standard_pct,
                instant: instant_pct,
            });
        }
        Ok(Self {
            standard_pct,
            instant_pct,
        })
    }

    /// Reads `STANDARD_FEE_PCT` / `INSTANT_FEE_PCT`; unset falls back per
    /// value, an unparseable value or an invalid pair is warned about
    /// before falling back to the defaults.
    pub fn from_env() -> Self {
        let standard = env_pct("STANDARD_FEE_PCT", default_standard_pct());
        let instant = env_pct("INSTANT_FEE_PCT", default_instant_pct());
        match Self::new(standard, instant) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!(error = %e, "invalid fee schedule in environment; using defaults");
                Self::default()
            }
        }
    }

    pub fn percentage(&self, channel: WithdrawalChannel) -> Decimal {
        match channel {
            WithdrawalChannel::Standard => self.standard_pct,
            WithdrawalChannel::Instant => self.instant_pct,
        }
    }

    /// Fee figures for `amount` on `channel`.
    ///
    /// The fee is rounded to two decimal places half-up; the net is the
    /// exact remainder, so `fee + net_amount` always reconstructs the
    /// requested amount.
    pub fn quote(&self, amount: Money, channel: WithdrawalChannel) -> Quote {
        let fee_percentage = self.percentage(channel);
        let fee =
            Money::new(amount.amount() * fee_percentage / Decimal::from(100)).round_cents();
        Quote {
            amount,
            fee_percentage,
            fee,
            net_amount: amount - fee,
        }
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            standard_pct: default_standard_pct(),
            instant_pct: default_instant_pct(),
        }
    }
}

fn env_pct(name: &str, default: Decimal) -> Decimal {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<Decimal>() {
            Ok(pct) => pct,
            Err(_) => {
                tracing::warn!(value = %raw, "{name} is not a decimal percentage; using {default}");
                default
            }
        },
        Err(_) => default,
    }
}

/// Fee figures for one prospective withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub amount: Money,
    pub fee_percentage: Decimal,
    pub fee: Money,
    pub net_amount: Money,
}
