//! Log subscriber setup for the binaries

use crate::config::LoggingConfig;
use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level: {}", config.level))?,
    };

    let installed = match config.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init(),
        "pretty" => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        other => return Err(anyhow!("Unknown log format: {} (expected pretty or json)", other)),
    };
    installed.map_err(|e| anyhow!("Failed to install log subscriber: {}", e))
}
