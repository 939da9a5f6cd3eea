//! Server startup helper for the engine binary.
//!
//! [`spawn_server`] binds eagerly, so an unavailable port is reported to
//! the caller, then serves on a background Tokio task.

use std::net::SocketAddr;
use std::sync::Arc;

use satstream_core::config::ServerConfig;
use tokio::task::JoinHandle;

use crate::server::{ServerError, bind, serve};
use crate::state::AppState;

/// Errors that can occur when spawning the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// A server running on a background task.
#[derive(Debug)]
pub struct RunningServer {
    /// The address actually bound (resolves port 0).
    pub local_addr: SocketAddr,
    /// The serving task. Completes after the root token is cancelled.
    pub task: JoinHandle<()>,
}

/// Bind `config` and serve on a background task.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address cannot be bound.
pub async fn spawn_server(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<RunningServer, StartupError> {
    let listener = bind(config).await?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("listener has no local address: {e}")))?;

    let task = tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            tracing::error!(error = %e, "Server exited with error");
        }
    });

    tracing::info!(%local_addr, "Server spawned on background task");

    Ok(RunningServer {
        local_addr,
        task,
    })
}
