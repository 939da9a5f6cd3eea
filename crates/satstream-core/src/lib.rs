//! Streaming core for Satstream.
//!
//! This crate owns everything between the orbit math and the network:
//!
//! - [`config`] -- Typed YAML configuration with defaults for every field
//! - [`registry`] -- [`ConnectionRegistry`], the only cross-session shared state
//! - [`window`] -- Sample offsets and per-window wall-clock capture
//! - [`session`] -- [`BroadcastSession`], the per-client
//!   `Connecting -> Streaming -> Closed` state machine and streaming loop
//!
//! # Concurrency
//!
//! Each connected client runs one [`BroadcastSession`] on its own Tokio
//! task. Sessions suspend only on the pacing sleep and on sends. The
//! registry is guarded by a [`tokio::sync::RwLock`]; broadcast takes a
//! snapshot of handles under the read lock and sends with the lock
//! released, so concurrent add/remove never blocks on a slow peer.
//!
//! [`ConnectionRegistry`]: registry::ConnectionRegistry
//! [`BroadcastSession`]: session::BroadcastSession

pub mod config;
pub mod registry;
pub mod session;
pub mod window;

pub use config::{ConfigError, SatstreamConfig};
pub use registry::{BroadcastReport, ConnectionRegistry, ConnectionSendError, SessionHandle};
pub use session::{BroadcastSession, CloseReason, SessionState, StreamPlan};
pub use window::{SampleSchedule, Window};
