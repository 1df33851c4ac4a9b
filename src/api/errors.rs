use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::analytics::scope::ScopeError;

/// Failures surfaced by the query endpoints, mapped onto the dashboard's
/// status-code contract. Everything unexpected collapses into `Internal`:
/// logged in full server-side, surfaced as a generic 500 with no detail.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid device identifier")]
    InvalidDeviceIdentifier,
    #[error("device not found")]
    DeviceNotFound,
    #[error("missing or malformed user identity")]
    MissingCaller,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ScopeError> for ApiError {
    fn from(e: ScopeError) -> Self {
        match e {
            ScopeError::InvalidDeviceIdentifier => ApiError::InvalidDeviceIdentifier,
            ScopeError::DeviceNotFound => ApiError::DeviceNotFound,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidDeviceIdentifier => {
                (StatusCode::BAD_REQUEST, "Invalid device identifier")
            }
            ApiError::DeviceNotFound => (StatusCode::NOT_FOUND, "Device not found"),
            ApiError::MissingCaller => (StatusCode::BAD_REQUEST, "Missing user identity"),
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "Unhandled error in query endpoint");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}
