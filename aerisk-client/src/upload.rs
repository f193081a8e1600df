//! Upload/predict orchestrator
//!
//! Owns the in-memory pipeline state (probe status, model catalog) and is
//! the only writer of the session context.
//!
//! Submission preconditions are checked in order and short-circuit on the
//! first failure, before any network call:
//! 1. a file is selected
//! 2. it is a CSV (`.csv` name, or `text/csv` / `application/vnd.ms-excel`)
//! 3. an analysis type is selected (and known)
//! 4. the backend offers at least one model

use crate::backend::{Backend, BackendError, CsvUpload};
use crate::probe::{BackendProber, BackoffPolicy, ProbeSnapshot};
use crate::registry::{self, ModelCatalog};
use aerisk_common::{AnalysisType, PredictionResult, SessionContext, UploadBundle};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Media types accepted in place of a `.csv` extension
pub const CSV_MEDIA_TYPES: &[&str] = &["text/csv", "application/vnd.ms-excel"];

pub const GENERIC_SUBMIT_FAILURE: &str = "Unable to process the CSV right now. Please try again.";

/// Client-side rejection; never reaches the network
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select a CSV file.")]
    MissingFile,

    #[error("Only CSV files are allowed.")]
    NotCsv,

    #[error("Please select an analysis type.")]
    MissingAnalysisType,

    #[error("Unknown analysis type '{0}'.")]
    UnknownAnalysisType(String),

    #[error("No models are available on the backend. Add .pkl files in the Model folder.")]
    NoModels,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unable to read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Predict call failed; carries the most specific message available
    #[error("{0}")]
    Submission(String),

    #[error("Unable to save results for this session: {0}")]
    Session(#[from] aerisk_common::Error),
}

/// A file chosen for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    /// Declared media type, when the caller knows one
    pub media_type: Option<String>,
}

impl SelectedFile {
    pub fn from_path(path: impl Into<PathBuf>, media_type: Option<String>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            media_type,
        }
    }
}

/// Name ends in `.csv` (any case) or the declared type is a CSV type
pub fn is_csv(name: &str, media_type: Option<&str>) -> bool {
    name.to_lowercase().ends_with(".csv")
        || media_type.is_some_and(|t| CSV_MEDIA_TYPES.contains(&t.trim()))
}

/// Preconditions 1 and 2
pub fn validate_file(file: Option<&SelectedFile>) -> Result<&SelectedFile, ValidationError> {
    let file = file.ok_or(ValidationError::MissingFile)?;
    if is_csv(&file.name, file.media_type.as_deref()) {
        Ok(file)
    } else {
        Err(ValidationError::NotCsv)
    }
}

/// Preconditions 1 to 3, all local
pub fn validate_selection<'a>(
    file: Option<&'a SelectedFile>,
    analysis_key: Option<&str>,
) -> Result<(&'a SelectedFile, &'static AnalysisType), ValidationError> {
    let file = validate_file(file)?;
    let key = analysis_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(ValidationError::MissingAnalysisType)?;
    let analysis = AnalysisType::find(key)
        .ok_or_else(|| ValidationError::UnknownAnalysisType(key.to_string()))?;
    Ok((file, analysis))
}

/// Message for a failed predict call
///
/// Priority: server `message`, server `detail`, client-side error message,
/// generic fallback.
pub fn submission_message(e: &BackendError) -> String {
    if let Some(message) = e.body_field("message").or_else(|| e.body_field("detail")) {
        return message.to_string();
    }
    let transport = e.transport_message();
    if transport.trim().is_empty() {
        GENERIC_SUBMIT_FAILURE.to_string()
    } else {
        transport
    }
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub result: PredictionResult,
    pub file_name: String,
    pub analysis: &'static AnalysisType,
    /// Required columns absent from the CSV header (advisory only)
    pub missing_columns: Vec<&'static str>,
}

pub struct UploadOrchestrator<B> {
    backend: Arc<B>,
    prober: BackendProber<B>,
    catalog: RwLock<ModelCatalog>,
    session: Arc<SessionContext>,
    liveness: CancellationToken,
}

impl<B: Backend> UploadOrchestrator<B> {
    pub fn new(backend: Arc<B>, policy: BackoffPolicy, session: Arc<SessionContext>) -> Self {
        let liveness = CancellationToken::new();
        let prober = BackendProber::new(backend.clone(), policy, liveness.clone());
        Self {
            backend,
            prober,
            catalog: RwLock::new(ModelCatalog::default()),
            session,
            liveness,
        }
    }

    pub fn base_url(&self) -> &str {
        self.backend.base_url()
    }

    pub fn prober(&self) -> &BackendProber<B> {
        &self.prober
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub async fn catalog(&self) -> ModelCatalog {
        self.catalog.read().await.clone()
    }

    /// Probe with backoff; fetch the model list once ready
    pub async fn connect(&self) -> ProbeSnapshot {
        let snapshot = self.prober.run().await;
        if snapshot.is_ready() {
            self.refresh_models().await;
        }
        snapshot
    }

    /// Manual retry: one probe, then the model list on success
    pub async fn retry_connection(&self) -> ProbeSnapshot {
        let snapshot = self.prober.retry_once().await;
        if snapshot.is_ready() {
            self.refresh_models().await;
        }
        snapshot
    }

    /// Fetch the model list; discarded if disposed meanwhile
    pub async fn refresh_models(&self) -> ModelCatalog {
        let outcome = registry::fetch_models(self.backend.as_ref()).await;
        if self.liveness.is_cancelled() {
            debug!("Orchestrator disposed; discarding model list");
            return self.catalog().await;
        }

        let catalog = ModelCatalog::from_fetch(outcome);
        *self.catalog.write().await = catalog.clone();
        catalog
    }

    /// Stop publishing state; in-flight probe and model results are dropped
    pub fn dispose(&self) {
        self.liveness.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.liveness.is_cancelled()
    }

    /// Validate, upload and persist one CSV
    ///
    /// On success the filename, CSV text, analysis type and decoded response
    /// are committed to the session together. On failure the session is left
    /// untouched. The predict call is never retried automatically.
    pub async fn submit(
        &self,
        file: Option<&SelectedFile>,
        analysis_key: Option<&str>,
    ) -> Result<SubmitOutcome, SubmitError> {
        let (file, analysis) = validate_selection(file, analysis_key)?;

        if self.catalog.read().await.is_empty() {
            return Err(ValidationError::NoModels.into());
        }

        // Upload the exact bytes; the session keeps a lossy text copy
        let content = tokio::fs::read(&file.path)
            .await
            .map_err(|source| SubmitError::ReadFile {
                path: file.path.clone(),
                source,
            })?;
        let csv_text = String::from_utf8_lossy(&content).into_owned();

        let missing_columns = csv_text
            .lines()
            .next()
            .map(|header| analysis.missing_columns(header))
            .unwrap_or_else(|| analysis.required_fields.to_vec());
        if !missing_columns.is_empty() {
            warn!(
                analysis = analysis.key,
                "CSV header is missing required columns: {}",
                missing_columns.join(", ")
            );
        }

        let upload = CsvUpload {
            file_name: file.name.clone(),
            media_type: file.media_type.clone(),
            content,
        };

        info!(
            file_name = %file.name,
            model = analysis.model_name,
            bytes = upload.content.len(),
            "Submitting CSV for prediction"
        );

        let response = self
            .backend
            .predict(analysis.model_name, upload)
            .await
            .map_err(|e| {
                warn!("Prediction request failed: {}", e);
                SubmitError::Submission(submission_message(&e))
            })?;

        let result = PredictionResult::from_value(response).ok_or_else(|| {
            warn!("Prediction response is not a JSON object");
            SubmitError::Submission(GENERIC_SUBMIT_FAILURE.to_string())
        })?;

        self.session.commit(&UploadBundle {
            file_name: file.name.clone(),
            csv_text,
            analysis_type: analysis.key.to_string(),
            result: result.clone(),
        })?;

        info!(file_name = %file.name, model = analysis.model_name, "Prediction stored in session");

        Ok(SubmitOutcome {
            result,
            file_name: file.name.clone(),
            analysis,
            missing_columns,
        })
    }
}

impl<B> Drop for UploadOrchestrator<B> {
    fn drop(&mut self) {
        self.liveness.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn file(name: &str, media_type: Option<&str>) -> SelectedFile {
        SelectedFile::from_path(format!("/tmp/{}", name), media_type.map(str::to_string))
    }

    #[test]
    fn test_csv_by_extension_any_case() {
        assert!(is_csv("engine.csv", None));
        assert!(is_csv("ENGINE.CSV", None));
        assert!(!is_csv("engine.csv.txt", None));
    }

    #[test]
    fn test_csv_by_media_type() {
        assert!(is_csv("export", Some("text/csv")));
        assert!(is_csv("export.dat", Some("application/vnd.ms-excel")));
        assert!(!is_csv("export.xlsx", Some("application/octet-stream")));
    }

    #[test]
    fn test_validate_file_order() {
        assert_eq!(validate_file(None), Err(ValidationError::MissingFile));

        let pdf = file("report.pdf", Some("application/pdf"));
        assert_eq!(validate_file(Some(&pdf)), Err(ValidationError::NotCsv));

        let csv = file("data.csv", None);
        assert_eq!(validate_file(Some(&csv)).unwrap().name, "data.csv");
    }

    #[test]
    fn test_validate_selection_rejects_blank_analysis() {
        let csv = file("data.csv", None);
        assert_eq!(
            validate_selection(Some(&csv), Some("   ")),
            Err(ValidationError::MissingAnalysisType)
        );
        assert_eq!(
            validate_selection(Some(&csv), None),
            Err(ValidationError::MissingAnalysisType)
        );
        assert_eq!(
            validate_selection(Some(&csv), Some("weather")),
            Err(ValidationError::UnknownAnalysisType("weather".to_string()))
        );

        let (_, analysis) = validate_selection(Some(&csv), Some(" durability ")).unwrap();
        assert_eq!(analysis.key, "durability");
    }

    #[test]
    fn test_validate_selection_checks_file_first() {
        let pdf = file("report.pdf", None);
        assert_eq!(validate_selection(Some(&pdf), Some("")), Err(ValidationError::NotCsv));
        assert_eq!(validate_selection(None, None), Err(ValidationError::MissingFile));
    }

    #[test]
    fn test_submission_message_priority() {
        let both = BackendError::Status {
            status: 400,
            reason: "Bad Request".to_string(),
            body: Some(json!({"message": "Only CSV files are allowed", "detail": "ignored"})),
        };
        assert_eq!(submission_message(&both), "Only CSV files are allowed");

        let detail = BackendError::Status {
            status: 404,
            reason: "Not Found".to_string(),
            body: Some(json!({"detail": "Model 'x' not found."})),
        };
        assert_eq!(submission_message(&detail), "Model 'x' not found.");

        let bare = BackendError::Status {
            status: 502,
            reason: "Bad Gateway".to_string(),
            body: None,
        };
        assert_eq!(submission_message(&bare), "Request failed with status code 502");

        let silent = BackendError::Transport(String::new());
        assert_eq!(submission_message(&silent), GENERIC_SUBMIT_FAILURE);
    }

    #[test]
    fn test_selected_file_name_from_path() {
        let f = SelectedFile::from_path("/data/fleet/engine_07.csv", None);
        assert_eq!(f.name, "engine_07.csv");
    }
}
