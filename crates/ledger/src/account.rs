//! Account rows: derived balance plus encrypted profile attributes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use coffer_core::{AccountId, Money};
use coffer_crypto::FieldCodec;

/// One account document.
///
/// `balance` is derived state owned by the ledger store: the sum of applied
/// charges minus the net of approved withdrawals. Everything else on the row
/// is profile data the storefront attaches; sensitive attributes among it
/// are stored encrypted. `version` backs the store's compare-and-set
/// contract and bumps on every balance mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub balance: Money,
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl AccountRecord {
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            balance: Money::ZERO,
            version: 0,
            display_name: None,
            attributes: Map::new(),
        }
    }

    pub fn with_balance(id: AccountId, balance: Money) -> Self {
        Self {
            balance,
            ..Self::new(id)
        }
    }

    /// Attribute as text, if present and textual.
    pub fn attribute_text(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    /// Copy with the sensitive attributes encrypted, ready to persist.
    pub fn encrypt_attributes(&self, codec: &FieldCodec) -> AccountRecord {
        AccountRecord {
            attributes: codec.encrypt_record(&self.attributes),
            ..self.clone()
        }
    }

    /// Copy with the sensitive attributes decrypted for presentation.
    pub fn decrypt_attributes(&self, codec: &FieldCodec) -> AccountRecord {
        AccountRecord {
            attributes: codec.decrypt_record(&self.attributes),
            ..self.clone()
        }
    }
}
