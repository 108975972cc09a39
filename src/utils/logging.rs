//! Tracing setup for embedders.
//!
//! The pipeline itself only emits `tracing` events; installing a
//! subscriber is left to the hosting application, which typically calls
//! [`init`] once at startup.

use tracing_subscriber::EnvFilter;

/// Install the default fmt subscriber, honoring `RUST_LOG` and falling
/// back to `info`. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
