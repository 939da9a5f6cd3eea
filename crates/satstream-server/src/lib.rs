//! HTTP and `WebSocket` server for Satstream.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`) streaming one JSON position sample
//!   per pacing interval to every connected client
//! - **REST endpoints** for health, the configured orbit, an on-demand
//!   position fix, and the list of active sessions
//! - **Minimal HTML page** (`GET /`) describing the stream
//!
//! # Architecture
//!
//! Each accepted `WebSocket` gets a [`BroadcastSession`] running on its
//! own task plus a connection pump that forwards queued samples to the
//! socket and answers control frames. Both are spawned on the shared
//! [`TaskTracker`] and observe a child of the server's root
//! [`CancellationToken`], so shutdown can cancel and then drain them.
//!
//! [`BroadcastSession`]: satstream_core::BroadcastSession
//! [`TaskTracker`]: tokio_util::task::TaskTracker
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use startup::{RunningServer, StartupError, spawn_server};
pub use state::AppState;
