//! Single-value encryption and decryption.

use std::sync::Once;

use fernet::Fernet;

/// Literal prefix every Fernet token starts with. Anything without it is
/// treated as plaintext, which keeps records written before encryption was
/// enabled readable.
pub const CIPHERTEXT_SENTINEL: &str = "gAAAAA";

static DEGRADED_WARNING: Once = Once::new();

fn warn_degraded() {
    DEGRADED_WARNING.call_once(|| {
        tracing::warn!(
            "no usable encryption key configured; sensitive fields pass through as plaintext"
        );
    });
}

/// Returns true if `value` carries the ciphertext sentinel.
pub fn is_ciphertext(value: &str) -> bool {
    value.starts_with(CIPHERTEXT_SENTINEL)
}

/// Encrypts and decrypts individual string values.
///
/// Construction never fails: an absent or malformed key yields a *degraded*
/// codec that returns every input unchanged. That trade (availability over
/// confidentiality) is deliberate; deployments that must not run in
/// plaintext check [`FieldCodec::is_degraded`] at startup and refuse.
pub struct FieldCodec {
    fernet: Option<Fernet>,
}

impl FieldCodec {
    /// Codec from an explicit key. `None`, or a key Fernet rejects, degrades.
    pub fn new(key: Option<&str>) -> Self {
        let fernet = match key {
            None => None,
            Some(raw) => {
                let parsed = Fernet::new(raw);
                if parsed.is_none() {
                    tracing::warn!("encryption key rejected as malformed; encryption disabled");
                }
                parsed
            }
        };
        Self { fernet }
    }

    /// Codec from the `ENCRYPTION_KEY` environment variable.
    pub fn from_env() -> Self {
        match std::env::var("ENCRYPTION_KEY") {
            Ok(key) => Self::new(Some(&key)),
            Err(_) => {
                tracing::warn!("ENCRYPTION_KEY not set; field encryption disabled");
                Self::new(None)
            }
        }
    }

    /// A fresh Fernet key, base64 text, suitable for `ENCRYPTION_KEY`.
    pub fn generate_key() -> String {
        Fernet::generate_key()
    }

    /// True when no usable key is configured. Startup policy hook: the codec
    /// itself keeps operating in pass-through mode either way.
    pub fn is_degraded(&self) -> bool {
        self.fernet.is_none()
    }

    /// Encrypt a value. Never fails: empty input and degraded mode both
    /// return the input unchanged (degraded mode warns once per process).
    pub fn encrypt(&self, plaintext: &str) -> String {
        if plaintext.is_empty() {
            return plaintext.to_string();
        }
        match &self.fernet {
            Some(fernet) => fernet.encrypt(plaintext.as_bytes()),
            None => {
                warn_degraded();
                plaintext.to_string()
            }
        }
    }

    /// Decrypt a value. Never fails: anything without the sentinel is
    /// returned untouched without attempting decryption, and sentinel
    /// values that do not decrypt (wrong key, corrupt token, no key) come
    /// back unchanged.
    pub fn decrypt(&self, value: &str) -> String {
        if value.is_empty() || !is_ciphertext(value) {
            return value.to_string();
        }
        let Some(fernet) = &self.fernet else {
            warn_degraded();
            tracing::debug!("decryption skipped: no key configured");
            return value.to_string();
        };
        match fernet.decrypt(value) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(plaintext) => plaintext,
                Err(_) => {
                    tracing::debug!("decrypted payload is not UTF-8; returning value unchanged");
                    value.to_string()
                }
            },
            Err(err) => {
                tracing::debug!(error = %err, "ciphertext did not decrypt; returning value unchanged");
                value.to_string()
            }
        }
    }
}

impl core::fmt::Debug for FieldCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FieldCodec")
            .field("degraded", &self.is_degraded())
            .finish()
    }
}
