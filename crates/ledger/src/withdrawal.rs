//! Withdrawal requests and their state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coffer_core::{AccountId, LedgerError, LedgerResult, Money, RequestId};
use coffer_crypto::FieldCodec;

/// Request lifecycle: `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
        }
    }
}

impl core::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an approved payout goes. The `withdrawal_type` tag and the field
/// names are the stored shape; `iban` and `wallet_number` are sensitive and
/// held encrypted at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "withdrawal_type", rename_all = "lowercase")]
pub enum Destination {
    Bank { bank_name: String, iban: String },
    Wallet { wallet_type: String, wallet_number: String },
}

impl Destination {
    /// Copy with the sensitive field encrypted. Display fields (bank name,
    /// wallet kind) stay readable for listings.
    pub fn encrypted(&self, codec: &FieldCodec) -> Destination {
        match self {
            Destination::Bank { bank_name, iban } => Destination::Bank {
                bank_name: bank_name.clone(),
                iban: codec.encrypt(iban),
            },
            Destination::Wallet {
                wallet_type,
                wallet_number,
            } => Destination::Wallet {
                wallet_type: wallet_type.clone(),
                wallet_number: codec.encrypt(wallet_number),
            },
        }
    }

    /// Copy with the sensitive field decrypted (no-op for plaintext rows).
    pub fn decrypted(&self, codec: &FieldCodec) -> Destination {
        match self {
            Destination::Bank { bank_name, iban } => Destination::Bank {
                bank_name: bank_name.clone(),
                iban: codec.decrypt(iban),
            },
            Destination::Wallet {
                wallet_type,
                wallet_number,
            } => Destination::Wallet {
                wallet_type: wallet_type.clone(),
                wallet_number: codec.decrypt(wallet_number),
            },
        }
    }
}

/// A withdrawal request as persisted in `withdrawal_requests`.
///
/// Created in `Pending` with the fee figures already computed; no funds are
/// debited until an approval commits. Approval and rejection are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: RequestId,
    pub user_id: AccountId,
    pub amount: Money,
    pub fee: Money,
    pub fee_percentage: Decimal,
    pub net_amount: Money,
    #[serde(flatten)]
    pub destination: Destination,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

impl WithdrawalRequest {
    /// Mark approved. Fails from any terminal state so double-processing is
    /// detected, never silently ignored. Balance movement is the store's
    /// job; this only transitions the record.
    pub fn approve(&mut self, approved_at: DateTime<Utc>) -> LedgerResult<()> {
        self.ensure_pending()?;
        self.status = WithdrawalStatus::Approved;
        self.approved_at = Some(approved_at);
        Ok(())
    }

    /// Mark rejected. Fails from any terminal state. No balance effect.
    pub fn reject(&mut self) -> LedgerResult<()> {
        self.ensure_pending()?;
        self.status = WithdrawalStatus::Rejected;
        Ok(())
    }

    fn ensure_pending(&self) -> LedgerResult<()> {
        if self.status.is_terminal() {
            return Err(LedgerError::invalid_transition(self.status.as_str()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_request() -> WithdrawalRequest {
        WithdrawalRequest {
            id: RequestId::new(),
            user_id: AccountId::new("7512345678"),
            amount: Money::from(100),
            fee: Money::from(8),
            fee_percentage: Decimal::from(8),
            net_amount: Money::from(92),
            destination: Destination::Bank {
                bank_name: "Alinma".to_string(),
                iban: "SA0380000000608010167519".to_string(),
            },
            status: WithdrawalStatus::Pending,
            created_at: Utc::now(),
            approved_at: None,
        }
    }

    #[test]
    fn approve_transitions_pending_and_stamps_time() {
        let mut request = test_request();
        let at = Utc::now();
        request.approve(at).unwrap();
        assert_eq!(request.status, WithdrawalStatus::Approved);
        assert_eq!(request.approved_at, Some(at));
    }

    #[test]
    fn approve_twice_fails_with_state_transition() {
        let mut request = test_request();
        request.approve(Utc::now()).unwrap();
        let err = request.approve(Utc::now()).unwrap_err();
        match err {
            LedgerError::InvalidStateTransition { from } if from == "approved" => {}
            _ => panic!("Expected InvalidStateTransition from approved"),
        }
    }

    #[test]
    fn rejected_requests_cannot_be_approved() {
        let mut request = test_request();
        request.reject().unwrap();
        assert_eq!(request.status, WithdrawalStatus::Rejected);
        assert_eq!(request.approved_at, None);
        assert!(request.approve(Utc::now()).is_err());
    }

    #[test]
    fn stored_shape_flattens_the_destination_tag() {
        let request = test_request();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["withdrawal_type"], serde_json::json!("bank"));
        assert_eq!(value["bank_name"], serde_json::json!("Alinma"));
        assert_eq!(value["status"], serde_json::json!("pending"));

        let back: WithdrawalRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn destination_encryption_touches_only_the_sensitive_field() {
        let codec = FieldCodec::new(Some(&FieldCodec::generate_key()));
        let destination = Destination::Wallet {
            wallet_type: "stc_pay".to_string(),
            wallet_number: "0501234567".to_string(),
        };

        let stored = destination.encrypted(&codec);
        match &stored {
            Destination::Wallet {
                wallet_type,
                wallet_number,
            } => {
                assert_eq!(wallet_type, "stc_pay");
                assert!(coffer_crypto::is_ciphertext(wallet_number));
            }
            _ => panic!("Expected wallet destination"),
        }

        assert_eq!(stored.decrypted(&codec), destination);
    }
}
