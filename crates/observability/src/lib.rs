//! Tracing setup shared by hosts and integration tests.

use tracing_subscriber::EnvFilter;

/// Initialize process-wide tracing: JSON lines with timestamps, filtered
/// by `RUST_LOG` (`info` when unset).
///
/// Safe to call multiple times; subsequent calls become no-ops, so hosts
/// and test binaries can share it without coordination.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
