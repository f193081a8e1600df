//! HTTP API handlers for aerisk-server

pub mod health;
pub mod models;
pub mod predict;

pub use health::health_routes;
pub use models::model_routes;
pub use predict::predict_routes;

use crate::error::{ApiError, NOT_FOUND_MESSAGE};

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::NotFound(NOT_FOUND_MESSAGE.to_string())
}
