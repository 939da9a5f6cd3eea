//! HTTP server lifecycle management.
//!
//! [`start_server`] binds the configured address and serves until the
//! state's root [`CancellationToken`] is cancelled. New connections stop
//! being accepted as soon as the token fires; open `WebSocket` sessions
//! observe child tokens and wind down on their own.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

use std::sync::Arc;

use satstream_core::config::ServerConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Bind a TCP listener for `config`.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address cannot be resolved or
/// bound.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| {
            ServerError::Bind(format!("bind failed on {}:{}: {e}", config.host, config.port))
        })
}

/// Serve requests on an already-bound listener until shutdown.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServerError> {
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Serve(format!("listener has no local address: {e}")))?;
    let shutdown = state.shutdown.clone();
    let router = build_router(state);

    info!(%addr, "Satstream server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!(%addr, "Satstream server stopped accepting connections");
    Ok(())
}

/// Bind and serve in one step.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind or the server
/// encounters a fatal I/O error.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let listener = bind(config).await?;
    serve(listener, state).await
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
