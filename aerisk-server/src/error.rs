//! Error types for aerisk-server
//!
//! Every failure is answered as `{ "success": false, "message": ... }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub const NO_FILE_MESSAGE: &str = "No file uploaded";
pub const NOT_CSV_MESSAGE: &str = "Only CSV files are allowed";
pub const TOO_LARGE_MESSAGE: &str = "File size exceeds 50MB limit";
pub const NOT_FOUND_MESSAGE: &str = "Endpoint not found";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Upload over the size limit (413)
    #[error("{}", TOO_LARGE_MESSAGE)]
    PayloadTooLarge,

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    #[error("Error processing CSV file: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "Request rejected: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
