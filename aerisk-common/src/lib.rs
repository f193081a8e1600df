//! # Aerisk Common Library
//!
//! Shared code for the Aerisk client and companion server including:
//! - Error types
//! - Configuration resolution (backend base URL, probe tuning)
//! - Analysis-type catalog
//! - Prediction result model and display rules
//! - Session context (last upload and prediction)

pub mod analysis;
pub mod config;
pub mod error;
pub mod prediction;
pub mod session;

pub use analysis::AnalysisType;
pub use error::{Error, Result};
pub use prediction::{PredictionResult, RiskTier};
pub use session::{SessionContext, UploadBundle};
