//! Signal handling and session draining.

use std::time::Duration;

use satstream_server::AppState;
use tracing::{info, warn};

use crate::error::EngineError;

/// Wait for Ctrl-C, or SIGTERM on Unix.
///
/// # Errors
///
/// Returns [`EngineError::Signal`] if a signal handler cannot be installed.
pub async fn signal() -> Result<(), EngineError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = term.recv() => {}
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok(())
    }
}

/// Cancel every session and wait up to `timeout` for their tasks.
///
/// Returns `true` if all tasks finished in time.
pub async fn drain(state: &AppState, timeout: Duration) -> bool {
    state.shutdown.cancel();
    let closed = state.registry.close_all().await;
    state.tracker.close();

    info!(
        closed_sessions = closed,
        pending_tasks = state.tracker.len(),
        "Draining connections"
    );

    if tokio::time::timeout(timeout, state.tracker.wait()).await.is_ok() {
        true
    } else {
        warn!(
            pending_tasks = state.tracker.len(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "Drain timed out"
        );
        false
    }
}
