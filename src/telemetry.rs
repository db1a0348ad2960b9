//! Tracing setup helpers.
//!
//! The library itself only emits `tracing` events; binaries and tests opt in
//! to a formatted subscriber here. `RUST_LOG` controls the filter.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a formatted `tracing` subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
