//! Axum router construction.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS and request tracing enabled.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- minimal HTML page
/// - `GET /ws` -- `WebSocket` position stream
/// - `GET /health` -- liveness probe
/// - `GET /api/orbit` -- configured orbit
/// - `GET /api/position` -- current Earth-fixed position
/// - `GET /api/sessions` -- active sessions
///
/// CORS allows any origin so browser clients on other hosts can connect.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws", get(ws::ws_stream))
        .route("/health", get(handlers::health))
        .route("/api/orbit", get(handlers::get_orbit))
        .route("/api/position", get(handlers::get_position))
        .route("/api/sessions", get(handlers::list_sessions))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
