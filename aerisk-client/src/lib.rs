//! Aerisk client library
//!
//! Pipeline for submitting aviation sensor CSVs to the prediction backend:
//! backend probing, model discovery, upload orchestration, the terminal
//! dashboard and PDF reports.

pub mod backend;
pub mod dashboard;
pub mod probe;
pub mod registry;
pub mod report;
pub mod upload;

pub use backend::{Backend, BackendError, CsvUpload, HttpBackend};
pub use dashboard::{Dashboard, NavigationState};
pub use probe::{BackendProber, BackoffPolicy, HealthState, ProbeFailure, ProbeSnapshot};
pub use registry::{ModelCatalog, RegistryError};
pub use report::{ReportError, ReportGenerator};
pub use upload::{SelectedFile, SubmitError, SubmitOutcome, UploadOrchestrator, ValidationError};
