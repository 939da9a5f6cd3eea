//! `WebSocket` endpoint streaming position samples.
//!
//! Clients connect to `GET /ws`. Every accepted connection runs two
//! cooperating tasks:
//!
//! - the [`BroadcastSession`], which produces samples and hands them to the
//!   registry at the pacing cadence
//! - the connection pump, which drains this connection's outbound queue
//!   into the socket as JSON text frames and answers control frames
//!
//! Inbound text and binary frames are ignored. A ping is answered with a
//! pong; a close frame, a read error, or a failed write ends the
//! connection and cancels its session. When the session ends first, the
//! registry drops the queue sender and the pump closes the socket.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use satstream_core::{BroadcastSession, CloseReason, SessionHandle};
use satstream_types::{PositionSample, SessionId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Why the connection pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpExit {
    /// The client sent a close frame or the stream ended.
    PeerClosed,
    /// Reading from or writing to the socket failed.
    SocketError,
    /// The session ended and dropped the outbound queue.
    SessionEnded,
    /// The session or server was cancelled.
    Cancelled,
}

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming position samples.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let id = SessionId::new();
    let failed_state = Arc::clone(&state);

    ws.on_failed_upgrade(move |e| {
        let mut session = BroadcastSession::new(
            id,
            Arc::clone(&failed_state.registry),
            Arc::clone(&failed_state.plan),
        );
        let reason = session.fail_handshake();
        warn!(session_id = %id, error = %e, reason = %reason, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| {
        let tracker = state.tracker.clone();
        tracker.track_future(handle_socket(socket, id, state))
    })
}

/// Drive one connection from registration to close.
async fn handle_socket(mut socket: WebSocket, id: SessionId, state: Arc<AppState>) {
    let mut session =
        BroadcastSession::new(id, Arc::clone(&state.registry), Arc::clone(&state.plan));
    let (handle, outbound) = SessionHandle::channel(id, state.channel_capacity);

    if state.is_shutting_down() || !session.register(handle).await {
        let reason = session.fail_handshake();
        debug!(session_id = %id, reason = %reason, "Rejecting connection");
        send_close(&mut socket, close_code::AWAY, "server unavailable").await;
        return;
    }

    let active = state.registry.len().await;
    info!(session_id = %id, active, "WebSocket client connected");

    let cancel = state.shutdown.child_token();
    let session_task = state.tracker.spawn(session.run(cancel.clone()));

    let exit = pump(&mut socket, outbound, &cancel, state.registry.send_timeout()).await;
    cancel.cancel();

    let reason = match session_task.await {
        Ok(reason) => reason,
        Err(e) => {
            warn!(session_id = %id, error = %e, "Session task failed");
            state.registry.remove(id).await;
            CloseReason::Cancelled
        }
    };

    if exit != PumpExit::PeerClosed && exit != PumpExit::SocketError {
        let (code, text) = close_frame_for(&reason, state.is_shutting_down());
        send_close(&mut socket, code, text).await;
    }

    let active = state.registry.len().await;
    info!(
        session_id = %id,
        reason = %reason,
        pump_exit = ?exit,
        active,
        "WebSocket client disconnected"
    );
}

/// Forward queued samples to the socket and service inbound frames.
async fn pump(
    socket: &mut WebSocket,
    mut outbound: mpsc::Receiver<PositionSample>,
    cancel: &CancellationToken,
    write_timeout: Duration,
) -> PumpExit {
    loop {
        tokio::select! {
            () = cancel.cancelled() => return PumpExit::Cancelled,

            sample = outbound.recv() => {
                let Some(sample) = sample else {
                    return PumpExit::SessionEnded;
                };
                let json = match serde_json::to_string(&sample) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!("Failed to serialize position sample: {e}");
                        continue;
                    }
                };
                if !write_bounded(socket, Message::Text(json.into()), write_timeout).await {
                    return PumpExit::SocketError;
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => return PumpExit::PeerClosed,
                    Some(Ok(Message::Ping(data))) => {
                        if !write_bounded(socket, Message::Pong(data), write_timeout).await {
                            return PumpExit::SocketError;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket read error: {e}");
                        return PumpExit::SocketError;
                    }
                    Some(Ok(_)) => {
                        // Client text, binary and pong frames carry no meaning here.
                    }
                }
            }
        }
    }
}

/// Write one frame, giving up after `timeout`. Returns `false` on failure.
async fn write_bounded(socket: &mut WebSocket, msg: Message, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, socket.send(msg)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("WebSocket write failed: {e}");
            false
        }
        Err(_) => {
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            debug!(timeout_ms, "WebSocket write timed out");
            false
        }
    }
}

const fn close_frame_for(reason: &CloseReason, shutting_down: bool) -> (u16, &'static str) {
    if shutting_down {
        return (close_code::AWAY, "server shutting down");
    }
    match reason {
        CloseReason::PropagationFailed(_) => (close_code::ERROR, "propagation failed"),
        CloseReason::SendFailed(_) | CloseReason::Evicted => {
            (close_code::POLICY, "connection too slow")
        }
        CloseReason::HandshakeFailed | CloseReason::Cancelled => {
            (close_code::NORMAL, "stream closed")
        }
    }
}

async fn send_close(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!("Failed to send close frame: {e}");
    }
}
