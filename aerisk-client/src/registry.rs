//! Model registry client
//!
//! Fetches the list of usable models once the backend is ready. No retry:
//! failures are reported immediately and leave the list empty.

use crate::backend::{Backend, BackendError};
use thiserror::Error;
use tracing::{info, warn};

pub const NO_MODELS_MESSAGE: &str =
    "No models found on the backend. Add .pkl files in the Model folder and restart the server.";

pub const FETCH_FAILED_MESSAGE: &str =
    "Unable to fetch models from backend. Ensure the API is running.";

/// Why the model list is unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The backend answered with an empty list
    #[error("{}", NO_MODELS_MESSAGE)]
    Empty,

    /// Transport or server failure (server detail preferred)
    #[error("{0}")]
    Fetch(String),
}

/// Model list plus the condition to surface alongside it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    pub models: Vec<String>,
    pub problem: Option<RegistryError>,
}

impl ModelCatalog {
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn from_fetch(outcome: Result<Vec<String>, RegistryError>) -> Self {
        match outcome {
            Ok(models) => Self {
                models,
                problem: None,
            },
            Err(problem) => Self {
                models: Vec::new(),
                problem: Some(problem),
            },
        }
    }
}

/// Fetch model identifiers; an empty list is reported as `RegistryError::Empty`
pub async fn fetch_models<B: Backend + ?Sized>(backend: &B) -> Result<Vec<String>, RegistryError> {
    match backend.list_models().await {
        Ok(models) if models.is_empty() => {
            warn!(backend = backend.base_url(), "Backend reports no models");
            Err(RegistryError::Empty)
        }
        Ok(models) => {
            info!(count = models.len(), "Fetched model list: {}", models.join(", "));
            Ok(models)
        }
        Err(e) => {
            warn!(backend = backend.base_url(), "Model list fetch failed: {}", e);
            Err(RegistryError::Fetch(fetch_failure_message(&e)))
        }
    }
}

fn fetch_failure_message(e: &BackendError) -> String {
    e.body_field("detail")
        .map(str::to_string)
        .unwrap_or_else(|| FETCH_FAILED_MESSAGE.to_string())
}
