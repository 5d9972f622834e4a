//! Structured logging with `tracing`.
//!
//! The filter comes from `RUST_LOG` and defaults to `info`.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global fmt subscriber.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init() -> bool {
    init_with_default("info")
}

/// Installs the global fmt subscriber using `default_filter` when `RUST_LOG`
/// is unset or invalid.
pub fn init_with_default(default_filter: &str) -> bool {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_thread_names(true)
        .with_target(true)
        .try_init()
        .is_ok()
}
