//! Shared type definitions for the Satstream position stream.
//!
//! Types defined here cross the system boundary: they are what the
//! WebSocket endpoint encodes and what the dashboard decodes. Bindings
//! flow downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for session identifiers
//! - [`sample`] -- The [`PositionSample`] record streamed to clients

pub mod ids;
pub mod sample;

pub use ids::SessionId;
pub use sample::{PositionSample, format_timestamp};
