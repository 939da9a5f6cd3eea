//! Error types for the REST layer.
//!
//! [`ApiError`] converts into an Axum response with a JSON body of the
//! form `{"error": "...", "status": 422}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use satstream_orbit::PropagationError;

/// Errors surfaced by REST handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The orbit could not be propagated to the requested instant.
    #[error("propagation failed: {0}")]
    Propagation(#[from] PropagationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Propagation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    #[tokio::test]
    async fn propagation_error_maps_to_422_json() {
        let err = ApiError::Propagation(PropagationError::NonFiniteElapsed(f64::NAN));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 422);
        assert!(json["error"].as_str().unwrap().starts_with("propagation failed"));
    }
}
