//! Shared application state for the server.
//!
//! [`AppState`] is wrapped in [`Arc`] and injected via Axum's `State`
//! extractor. It owns the [`ConnectionRegistry`] (the only state shared
//! between sessions), the read-only [`StreamPlan`], and the shutdown
//! primitives every connection task observes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use satstream_core::{ConfigError, ConnectionRegistry, SatstreamConfig, StreamPlan};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Shared state for the Axum application.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Active sessions.
    pub registry: Arc<ConnectionRegistry>,
    /// Orbit, frame and schedule shared by every session.
    pub plan: Arc<StreamPlan>,
    /// Outbound queue depth per connection.
    pub channel_capacity: usize,
    /// Root token. Each connection observes a child of it.
    pub shutdown: CancellationToken,
    /// Tracks every connection task so shutdown can wait for them.
    pub tracker: TaskTracker,
    /// When the server state was created.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state from a stream plan and registry settings.
    pub fn new(plan: StreamPlan, send_timeout: Duration, channel_capacity: usize) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new(send_timeout)),
            plan: Arc::new(plan),
            channel_capacity,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            started_at: Utc::now(),
        }
    }

    /// Create state from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the orbit or stream settings are invalid.
    pub fn from_config(config: &SatstreamConfig) -> Result<Self, ConfigError> {
        let plan = StreamPlan::from_config(config)?;
        Ok(Self::new(
            plan,
            config.stream.send_timeout(),
            config.stream.channel_capacity,
        ))
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
