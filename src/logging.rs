//! Logging setup for the `cgmflux` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the binary so embedders keep control of their own output.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging at WARN unless `RUST_LOG` says otherwise
pub fn init() {
    init_with_level("warn")
}

/// Initialize logging with a specific default level
///
/// # Arguments
/// * `default_level` - Default filter directive (trace, debug, info, warn, error)
///
/// `RUST_LOG` still takes precedence. Output goes to stderr so that stdout
/// carries only report data.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}
