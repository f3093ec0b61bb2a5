//! Field-batch operations over record maps.
//!
//! Stores hand whole records through these helpers before writing or after
//! reading; only the named fields are touched and the input is never
//! mutated in place.

use serde_json::{Map, Value};

use crate::codec::FieldCodec;

/// The sensitive fields every store shares. Encrypted at rest wherever a
/// record carries them.
pub const SENSITIVE_FIELDS: [&str; 8] = [
    "totp_secret",
    "email",
    "phone",
    "address",
    "balance",
    "hidden_data",
    "iban",
    "wallet_number",
];

/// Scalar rendering used before encryption. Containers and nulls are left
/// alone; the balance-as-text case is why numbers are accepted here.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl FieldCodec {
    /// Copy of `record` with the named fields encrypted. Absent, empty, and
    /// non-scalar fields are skipped.
    pub fn encrypt_fields(&self, record: &Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
        let mut out = record.clone();
        for field in fields {
            let Some(value) = out.get(*field) else {
                continue;
            };
            let Some(text) = scalar_text(value) else {
                continue;
            };
            out.insert((*field).to_string(), Value::String(self.encrypt(&text)));
        }
        out
    }

    /// Copy of `record` with the named fields decrypted. Values without the
    /// ciphertext sentinel come back unchanged, so mixed corpora are safe.
    pub fn decrypt_fields(&self, record: &Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
        let mut out = record.clone();
        for field in fields {
            let Some(Value::String(text)) = out.get(*field) else {
                continue;
            };
            if text.is_empty() {
                continue;
            }
            let plaintext = self.decrypt(text);
            out.insert((*field).to_string(), Value::String(plaintext));
        }
        out
    }

    /// [`FieldCodec::encrypt_fields`] over the shared [`SENSITIVE_FIELDS`].
    pub fn encrypt_record(&self, record: &Map<String, Value>) -> Map<String, Value> {
        self.encrypt_fields(record, &SENSITIVE_FIELDS)
    }

    /// [`FieldCodec::decrypt_fields`] over the shared [`SENSITIVE_FIELDS`].
    pub fn decrypt_record(&self, record: &Map<String, Value>) -> Map<String, Value> {
        self.decrypt_fields(record, &SENSITIVE_FIELDS)
    }
}
