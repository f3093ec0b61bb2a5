//! `coffer-crypto` — field-level encryption codec.
//!
//! Protects sensitive stored attributes (secrets, contact info, banking
//! identifiers) with Fernet tokens. The codec never fails a caller: with no
//! usable key it degrades to pass-through and warns once, and values that do
//! not decrypt come back unchanged. Old plaintext rows and new ciphertext
//! rows coexist in the same collections; the token's `gAAAAA` prefix is what
//! tells them apart.

pub mod codec;
pub mod fields;

pub use codec::{CIPHERTEXT_SENTINEL, FieldCodec, is_ciphertext};
pub use fields::SENSITIVE_FIELDS;
