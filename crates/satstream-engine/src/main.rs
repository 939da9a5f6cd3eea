//! Satstream binary.
//!
//! Loads configuration, serves the position stream, and shuts down
//! gracefully on Ctrl-C or SIGTERM.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `satstream-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Build the orbit, frame and stream plan
//! 4. Bind and serve HTTP + `WebSocket`
//! 5. Wait for a shutdown signal
//! 6. Cancel sessions, stop accepting, drain within the configured timeout

mod error;
mod shutdown;
mod telemetry;

use std::path::Path;
use std::sync::Arc;

use satstream_core::SatstreamConfig;
use satstream_server::AppState;
use tracing::{info, warn};

use crate::error::EngineError;

const CONFIG_PATH: &str = "satstream-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, logging, binding, or signal
/// handling fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    telemetry::init(&config.logging)?;
    info!("satstream-engine starting");
    if from_file {
        info!(path = CONFIG_PATH, "Configuration loaded");
    } else {
        info!(path = CONFIG_PATH, "Config file not found, using defaults");
    }

    // 3. Build shared state.
    let state = Arc::new(AppState::from_config(&config)?);
    info!(
        semi_major_axis_km = state.plan.elements.semi_major_axis_km(),
        eccentricity = state.plan.elements.eccentricity(),
        inclination_deg = state.plan.elements.inclination().to_degrees(),
        samples_per_window = state.plan.schedule.len(),
        pacing_ms = config.stream.pacing_interval_ms,
        delivery = ?config.stream.delivery,
        window_mode = ?config.stream.window_mode,
        "Stream plan ready"
    );

    // 4. Start the server.
    let server = satstream_server::spawn_server(&config.server, Arc::clone(&state)).await?;
    info!(addr = %server.local_addr, "Satstream server started");

    // 5. Wait for shutdown.
    tokio::select! {
        result = shutdown::signal() => {
            result?;
            info!("Shutdown signal received");
        }
        () = state.shutdown.cancelled() => {}
    }

    // 6. Drain.
    let drained = shutdown::drain(&state, config.shutdown.drain_timeout()).await;
    if let Err(e) = server.task.await {
        warn!(error = %e, "Server task ended abnormally");
    }

    info!(drained, "satstream-engine shutdown complete");
    Ok(())
}

/// Load configuration from `satstream-config.yaml` in the working
/// directory. Returns the config and whether the file was present.
fn load_config() -> Result<(SatstreamConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok((SatstreamConfig::from_file(config_path)?, true))
    } else {
        let mut config = SatstreamConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok((config, false))
    }
}
