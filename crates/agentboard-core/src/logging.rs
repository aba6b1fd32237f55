//! Logging setup.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the embedding binary, which can call this helper.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber honoring `RUST_LOG`.
///
/// Defaults to `info` when `RUST_LOG` is unset. Calling this more than once
/// is harmless; later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
