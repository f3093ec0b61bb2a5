//! Short-lived verification codes.
//!
//! Sensitive storefront actions (destination changes, manual credits) are
//! confirmed with a 6-digit code delivered out of band. Codes live in
//! memory with a TTL and are consumed on first successful match.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Lifetime of an issued verification code.
pub const CODE_TTL_SECONDS: i64 = 600;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Map with per-entry expiry.
///
/// Time is always passed in, never read from a clock, so expiry is
/// testable without sleeping. A poisoned lock reads as empty, which for
/// transient tokens means re-issue, never a panic.
#[derive(Debug)]
pub struct TtlStore<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash, V: Clone> TtlStore<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace, with a fresh deadline of `now + ttl`.
    pub fn insert(&self, key: K, value: V, now: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                key,
                Entry {
                    value,
                    expires_at: now + self.ttl,
                },
            );
        }
    }

    /// Live value for `key`. Entries at or past their deadline read as absent.
    pub fn get<Q>(&self, key: &Q, now: DateTime<Utc>) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;
        (entry.expires_at > now).then(|| entry.value.clone())
    }

    /// Remove and return the live value for `key`.
    pub fn take<Q>(&self, key: &Q, now: DateTime<Utc>) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = self.entries.write().ok()?;
        let entry = entries.remove(key)?;
        (entry.expires_at > now).then_some(entry.value)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.write().ok()?.remove(key).map(|e| e.value)
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Issued verification codes, one outstanding per subject.
#[derive(Debug)]
pub struct VerificationCodes {
    codes: TtlStore<String, String>,
}

impl VerificationCodes {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(CODE_TTL_SECONDS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            codes: TtlStore::new(ttl),
        }
    }

    /// Issue a code for `subject`, replacing any outstanding one.
    pub fn issue(&self, subject: impl Into<String>, now: DateTime<Utc>) -> String {
        let code = generate_code();
        self.codes.insert(subject.into(), code.clone(), now);
        code
    }

    /// Check `code` against the outstanding one for `subject`.
    ///
    /// A match consumes the code; a miss leaves it outstanding for
    /// another try until it expires.
    pub fn verify(&self, subject: &str, code: &str, now: DateTime<Utc>) -> bool {
        let Some(expected) = self.codes.get(subject, now) else {
            return false;
        };
        if expected == code {
            self.codes.remove(subject);
            true
        } else {
            false
        }
    }
}

impl Default for VerificationCodes {
    fn default() -> Self {
        Self::new()
    }
}

/// 6 digits, no leading zero. Entropy comes from the UUIDv7 random bits.
fn generate_code() -> String {
    let entropy = Uuid::now_v7().as_u128();
    let code = 100_000 + (entropy % 900_000) as u32;
    code.to_string()
}
