//! Tracing setup for embedding applications.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! the host application's job, typically first thing in `main`:
//!
//! ```rust,no_run
//! voicelink_client::telemetry::init();
//! ```

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "voicelink_client=info";

/// Install a formatted subscriber honoring `RUST_LOG`.
///
/// Safe to call once per process; later calls are ignored so tests can call
/// it freely.
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Install a formatted subscriber with `filter` as the fallback directive
/// when `RUST_LOG` is unset.
pub fn init_with_filter(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        init_with_filter("debug");
    }
}
