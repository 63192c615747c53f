//! Error taxonomy surfaced over HTTP.
//!
//! Only two failure classes reach clients: bad input (400) and a broken
//! distance provider (502). Solver infeasibility and budget expiry are
//! handled inside the engine and never become errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range input; no partial work happened.
    #[error("{0}")]
    Validation(String),

    /// The distance provider timed out, answered non-200, or returned a
    /// malformed matrix; the request fails atomically.
    #[error("distance provider failure: {0}")]
    Upstream(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn upstream(err: anyhow::Error) -> Self {
        Self::Upstream(format!("{:#}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "DISTANCE_PROVIDER_ERROR"),
        };
        let body = Json(json!({
            "error": code,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_400() {
        let response = ApiError::validation("orders[2].package.volume must be non-negative")
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upstream_maps_to_502() {
        let response = ApiError::upstream(anyhow::anyhow!("table request timed out")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_message_passthrough() {
        let error = ApiError::validation("duplicate order id \"o-3\"");
        assert_eq!(error.to_string(), "duplicate order id \"o-3\"");
    }
}
