//! Logging setup.
//!
//! The library only emits `tracing` events; binaries and test harnesses
//! call one of these to get them printed.

use crate::result::{PixelCheckError, PixelCheckResult};
use tracing_subscriber::EnvFilter;

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install a human-readable subscriber. `RUST_LOG` overrides `default_filter`.
///
/// # Errors
/// Returns error if a global subscriber is already installed
pub fn init_tracing(default_filter: &str) -> PixelCheckResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_target(true)
        .try_init()
        .map_err(|e| PixelCheckError::Logging {
            message: e.to_string(),
        })
}

/// Install a JSON-lines subscriber for machine consumption.
///
/// # Errors
/// Returns error if a global subscriber is already installed
pub fn init_json_tracing(default_filter: &str) -> PixelCheckResult<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(default_filter))
        .try_init()
        .map_err(|e| PixelCheckError::Logging {
            message: e.to_string(),
        })
}
