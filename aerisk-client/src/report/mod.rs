//! PDF prediction report
//!
//! Reads the last committed submission from the session context and writes
//! a paginated PDF: a results page (model, file, rows, summary, colour-coded
//! risk, predictions) and, when the CSV was captured, an input-data page with
//! the first 50 CSV lines. Every page carries the same footer.
//!
//! Only one generation runs at a time per generator.

pub mod layout;
mod pdf;

pub use layout::{
    layout_report, wrap_text, ItemKind, ReportDocument, ReportInput, ReportPage, TextItem,
};
pub use pdf::render_pdf;

use crate::dashboard::DEFAULT_FILE_NAME;
use aerisk_common::SessionContext;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("A report is already being generated")]
    Busy,

    #[error("No prediction results in this session. Submit a CSV first.")]
    NoResults,

    #[error("Unable to read session results: {0}")]
    Session(#[from] aerisk_common::Error),

    #[error("Unable to render PDF: {0}")]
    Render(String),

    #[error("Unable to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Clears the busy flag when generation ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ReportGenerator {
    output_dir: PathBuf,
    busy: AtomicBool,
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Lay out the session's current results without rendering
    pub fn build(session: &SessionContext) -> Result<ReportDocument, ReportError> {
        let snapshot = session.snapshot()?.ok_or(ReportError::NoResults)?;
        let file_name = snapshot.file_name.as_deref().unwrap_or(DEFAULT_FILE_NAME);

        Ok(layout_report(ReportInput {
            result: &snapshot.result,
            file_name,
            csv_text: snapshot.csv_text.as_deref(),
        }))
    }

    /// Generate `prediction-report-<epoch-millis>.pdf` in the output directory
    ///
    /// Returns `ReportError::Busy` if another generation is still running.
    pub fn generate(&self, session: &SessionContext) -> Result<PathBuf, ReportError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ReportError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        self.generate_locked(session).map_err(|e| {
            error!("Error generating PDF: {}", e);
            e
        })
    }

    fn generate_locked(&self, session: &SessionContext) -> Result<PathBuf, ReportError> {
        let doc = Self::build(session)?;
        let bytes = render_pdf(layout::REPORT_TITLE, &doc).map_err(ReportError::Render)?;

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.next_report_path();
        std::fs::write(&path, &bytes)?;

        info!(
            path = %path.display(),
            pages = doc.pages.len(),
            bytes = bytes.len(),
            "Prediction report written"
        );
        Ok(path)
    }

    fn next_report_path(&self) -> PathBuf {
        let mut stamp = chrono::Utc::now().timestamp_millis();
        loop {
            let path = self.output_dir.join(format!("prediction-report-{}.pdf", stamp));
            if !path.exists() {
                return path;
            }
            stamp += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerisk_common::session::KEY_PREDICTION_RESULT;
    use aerisk_common::{PredictionResult, RiskTier, UploadBundle};
    use serde_json::json;

    fn session_with(csv_lines: usize, risk: &str) -> SessionContext {
        let csv: String = std::iter::once("unit,cycle,s1\n".to_string())
            .chain((1..csv_lines).map(|i| format!("1,{},{}\n", i, i * 2)))
            .collect();

        let session = SessionContext::in_memory();
        session
            .commit(&UploadBundle {
                file_name: "engine.csv".to_string(),
                csv_text: csv,
                analysis_type: "remaining_useful_life".to_string(),
                result: PredictionResult::from_value(json!({
                    "model": "rul_model",
                    "rows": csv_lines - 1,
                    "summary": "Engine degradation within expected bounds.",
                    "risk_level": risk,
                    "prediction": [{"rul": 45, "unit": "cycles"}]
                }))
                .unwrap(),
            })
            .unwrap();
        session
    }

    #[test]
    fn test_csv_preview_truncated_with_notice() {
        let doc = ReportGenerator::build(&session_with(75, "Low Risk")).unwrap();
        assert_eq!(doc.pages.len(), 2);

        let input = &doc.pages[1];
        assert_eq!(input.texts(ItemKind::Title), vec!["Input Data"]);
        assert_eq!(input.texts(ItemKind::CsvLine).len(), 50);
        assert_eq!(
            input.texts(ItemKind::Notice),
            vec!["... 25 more lines not shown (showing first 50 of 75)"]
        );
    }

    #[test]
    fn test_short_csv_has_no_notice() {
        let doc = ReportGenerator::build(&session_with(10, "Low Risk")).unwrap();
        assert_eq!(doc.pages[1].texts(ItemKind::CsvLine).len(), 10);
        assert!(doc.pages[1].texts(ItemKind::Notice).is_empty());
    }

    #[test]
    fn test_footer_on_every_page() {
        let doc = ReportGenerator::build(&session_with(75, "Low Risk")).unwrap();
        for page in &doc.pages {
            assert_eq!(page.texts(ItemKind::Footer), vec![layout::FOOTER_TEXT]);
        }
    }

    #[test]
    fn test_results_page_fields_and_risk_colour() {
        let doc = ReportGenerator::build(&session_with(3, "High Risk")).unwrap();
        let page = &doc.pages[0];

        assert_eq!(page.texts(ItemKind::Title), vec!["Prediction Report"]);
        assert_eq!(
            page.texts(ItemKind::Field),
            vec!["Model: rul_model", "File: engine.csv", "Rows: 2"]
        );
        assert_eq!(page.texts(ItemKind::Prediction), vec!["[1] RUL: 45 cycles"]);

        let risk = page.items.iter().find(|i| i.kind == ItemKind::Risk).unwrap();
        assert_eq!(risk.text, "Risk Level: High Risk");
        assert_eq!(risk.color, RiskTier::Severe.rgb());
    }

    #[test]
    fn test_missing_file_name_uses_dashboard_default() {
        // Session file holding a result but no filename
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let entries = json!({ KEY_PREDICTION_RESULT: r#"{"model":"rul_model"}"# });
        std::fs::write(&path, entries.to_string()).unwrap();

        let doc = ReportGenerator::build(&SessionContext::open(&path)).unwrap();
        let fields = doc.pages[0].texts(ItemKind::Field);
        assert!(fields.contains(&format!("File: {}", DEFAULT_FILE_NAME).as_str()));
    }

    #[test]
    fn test_generate_without_results() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path());
        let err = generator.generate(&SessionContext::in_memory()).unwrap_err();
        assert!(matches!(err, ReportError::NoResults));
        assert!(!generator.is_busy());
    }

    #[test]
    fn test_generate_writes_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path().join("reports"));
        let path = generator.generate(&session_with(75, "Medium Risk")).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("prediction-report-") && name.ends_with(".pdf"));
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_busy_generator_rejects_second_request() {
        let generator = ReportGenerator::new(std::env::temp_dir());
        generator.busy.store(true, Ordering::Release);
        let err = generator.generate(&session_with(3, "Low Risk")).unwrap_err();
        assert!(matches!(err, ReportError::Busy));
    }
}
