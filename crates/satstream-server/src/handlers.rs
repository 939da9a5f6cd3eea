//! REST endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML page describing the stream |
//! | `GET` | `/health` | Liveness probe |
//! | `GET` | `/api/orbit` | Configured orbit and stream cadence |
//! | `GET` | `/api/position` | Earth-fixed position for the current instant |
//! | `GET` | `/api/sessions` | Active streaming sessions |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use satstream_orbit::Geodetic;
use satstream_types::{PositionSample, SessionId};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests.
    pub status: &'static str,
}

/// Body of `GET /api/orbit`.
#[derive(Debug, Serialize)]
pub struct OrbitResponse {
    /// Semi-major axis in km.
    pub semi_major_axis_km: f64,
    /// Eccentricity.
    pub eccentricity: f64,
    /// Inclination in degrees.
    pub inclination_deg: f64,
    /// Right ascension of the ascending node in degrees.
    pub raan_deg: f64,
    /// Argument of perigee in degrees.
    pub arg_perigee_deg: f64,
    /// True anomaly at epoch in degrees.
    pub true_anomaly_deg: f64,
    /// Element epoch.
    pub epoch: DateTime<Utc>,
    /// Orbital period in seconds.
    pub period_seconds: f64,
    /// Perigee radius in km.
    pub perigee_radius_km: f64,
    /// Apogee radius in km.
    pub apogee_radius_km: f64,
    /// Samples per window.
    pub samples_per_window: u64,
    /// Propagation offset between samples, in seconds.
    pub sample_spacing_seconds: u64,
    /// Real-time wait between samples, in milliseconds.
    pub pacing_interval_ms: u64,
}

/// Body of `GET /api/position`.
#[derive(Debug, Serialize)]
pub struct PositionResponse {
    /// The Earth-fixed sample, in the same shape as a stream message.
    #[serde(flatten)]
    pub sample: PositionSample,
    /// The same position as latitude, longitude and altitude.
    pub geodetic: Geodetic,
}

/// One entry of `GET /api/sessions`.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    /// Session identity.
    pub id: SessionId,
    /// When the connection registered.
    pub connected_at: DateTime<Utc>,
}

/// Body of `GET /api/sessions`.
#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    /// Number of registered sessions.
    pub count: usize,
    /// Registered sessions, oldest first.
    pub sessions: Vec<SessionSummary>,
}

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page with the stream endpoint and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let active = state.registry.len().await;
    let samples = state.plan.schedule.len();
    let spacing = state.plan.schedule.spacing_seconds();
    let pacing_ms = u64::try_from(state.plan.pacing.as_millis()).unwrap_or(u64::MAX);
    let a = state.plan.elements.semi_major_axis_km();
    let e = state.plan.elements.eccentricity();
    let i = state.plan.elements.inclination().to_degrees();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Satstream</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        li::before {{ content: "GET "; color: #7ee787; font-weight: bold; }}
        code {{ color: #7ee787; }}
    </style>
</head>
<body>
    <h1>Satstream</h1>
    <p class="subtitle">Earth-fixed satellite positions over WebSocket</p>
    <p>Orbit: a = {a:.1} km, e = {e:.4}, i = {i:.2} deg</p>
    <p>{samples} samples per window, {spacing} s apart, one every {pacing_ms} ms</p>
    <p>Active sessions: {active}</p>
    <p>Stream: <code>ws://&lt;host&gt;/ws</code></p>
    <ul>
        <li><a href="/health">/health</a></li>
        <li><a href="/api/orbit">/api/orbit</a></li>
        <li><a href="/api/position">/api/position</a></li>
        <li><a href="/api/sessions">/api/sessions</a></li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ---------------------------------------------------------------------------
// GET /api/orbit
// ---------------------------------------------------------------------------

/// Report the configured orbit and stream cadence.
pub async fn get_orbit(State(state): State<Arc<AppState>>) -> Json<OrbitResponse> {
    let plan = &state.plan;
    let el = &plan.elements;
    Json(OrbitResponse {
        semi_major_axis_km: el.semi_major_axis_km(),
        eccentricity: el.eccentricity(),
        inclination_deg: el.inclination().to_degrees(),
        raan_deg: el.raan().to_degrees(),
        arg_perigee_deg: el.arg_perigee().to_degrees(),
        true_anomaly_deg: el.true_anomaly().to_degrees(),
        epoch: el.epoch(),
        period_seconds: el.period_seconds(),
        perigee_radius_km: el.perigee_radius_km(),
        apogee_radius_km: el.apogee_radius_km(),
        samples_per_window: plan.schedule.len(),
        sample_spacing_seconds: plan.schedule.spacing_seconds(),
        pacing_interval_ms: u64::try_from(plan.pacing.as_millis()).unwrap_or(u64::MAX),
    })
}

// ---------------------------------------------------------------------------
// GET /api/position
// ---------------------------------------------------------------------------

/// Propagate to the current instant and return the Earth-fixed position.
///
/// # Errors
///
/// Returns [`ApiError::Propagation`] if Kepler's equation does not
/// converge.
pub async fn get_position(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PositionResponse>, ApiError> {
    let sample = state.plan.sample_now()?;
    let [x, y, z] = sample.position;
    let geodetic = Geodetic::from_ecef(&Vector3::new(x, y, z));
    Ok(Json(PositionResponse { sample, geodetic }))
}

// ---------------------------------------------------------------------------
// GET /api/sessions
// ---------------------------------------------------------------------------

/// List active sessions.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionsResponse> {
    let mut sessions: Vec<SessionSummary> = state
        .registry
        .sessions()
        .await
        .into_iter()
        .map(|(id, connected_at)| SessionSummary { id, connected_at })
        .collect();
    sessions.sort_by_key(|s| s.connected_at);

    Json(SessionsResponse {
        count: sessions.len(),
        sessions,
    })
}
