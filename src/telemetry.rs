//! Tracing subscriber setup for binaries and tests that embed the manager.
//!
//! The library itself only emits `tracing` events. Nothing is printed unless the
//! host installs a subscriber, either its own or the one [`init`] builds.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::ManagerConfig;

#[derive(Debug, Error)]
#[error("failed to initialise tracing subscriber: {0}")]
pub struct TelemetryError(String);

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `log_level` when set. With `json` the output is
/// one JSON object per line.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been set.
pub fn init(log_level: &str, json: bool) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let result = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    result.map_err(|e| TelemetryError(e.to_string()))
}

/// [`init`] with the level and format from `config`
pub fn init_from_config(config: &ManagerConfig) -> Result<(), TelemetryError> {
    init(&config.log_level, config.json_logs)
}
