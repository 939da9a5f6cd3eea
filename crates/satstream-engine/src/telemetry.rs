//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the configured `logging.level`
//! directive is used.

use satstream_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Install the global subscriber.
///
/// # Errors
///
/// Returns [`EngineError::Logging`] for an invalid level directive or if a
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| EngineError::Logging {
            message: format!("invalid log level `{}`: {e}", config.level),
        })?;

    let result = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };

    result.map_err(|e| EngineError::Logging {
        message: e.to_string(),
    })
}
