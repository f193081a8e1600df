//! aerisk-server library - companion upload server
//!
//! Local stand-in for the prediction backend: accepts CSV uploads, stores
//! them and answers with a deterministic placeholder prediction using the
//! same response shape the real backend returns.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

/// Upload size limit (50 MB)
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Where accepted uploads are written
    pub uploads_dir: PathBuf,
    /// Model identifiers offered by `/models`
    pub models: Arc<Vec<String>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(uploads_dir: impl Into<PathBuf>, models: Vec<String>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            models: Arc::new(models),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn has_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .merge(api::health_routes())
        .merge(api::model_routes())
        .merge(api::predict_routes())
        .fallback(api::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
