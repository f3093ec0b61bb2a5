//! Timestamp shapes produced by the external record store.
//!
//! Charge rows written over the system's lifetime carry three incompatible
//! timestamp representations: numeric epoch seconds, RFC 3339 (or bare
//! datetime) text, and a provider wrapper of whole seconds plus nanos.
//! [`StoredTimestamp`] is the single place they are recognized and converted;
//! everything past the ingestion boundary works in `DateTime<Utc>`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A charge timestamp as it appears in persisted rows.
///
/// Untagged: the JSON shape alone selects the variant. New rows are written
/// in the canonical [`StoredTimestamp::Epoch`] form; the other variants exist
/// to keep legacy rows readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredTimestamp {
    /// Epoch seconds, integer or fractional.
    Epoch(f64),
    /// RFC 3339 or bare `YYYY-MM-DD HH:MM:SS` text.
    Text(String),
    /// Provider timestamp wrapper.
    Provider {
        seconds: i64,
        #[serde(default)]
        nanos: u32,
    },
}

impl StoredTimestamp {
    /// The canonical form for rows written now.
    pub fn now() -> Self {
        Utc::now().into()
    }

    /// Normalize to UTC. `None` means the value is unusable (non-finite
    /// epoch, unparseable text, out-of-range seconds); callers decide the
    /// policy for that, this type never guesses.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            StoredTimestamp::Epoch(secs) => {
                if !secs.is_finite() {
                    return None;
                }
                DateTime::from_timestamp_millis((secs * 1000.0) as i64)
            }
            StoredTimestamp::Text(raw) => {
                if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
                    return Some(dt.with_timezone(&Utc));
                }
                // Naive datetimes were written in UTC.
                for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
                        return Some(naive.and_utc());
                    }
                }
                None
            }
            StoredTimestamp::Provider { seconds, nanos } => {
                DateTime::from_timestamp(*seconds, *nanos)
            }
        }
    }
}

impl From<DateTime<Utc>> for StoredTimestamp {
    fn from(value: DateTime<Utc>) -> Self {
        StoredTimestamp::Epoch(value.timestamp_millis() as f64 / 1000.0)
    }
}
