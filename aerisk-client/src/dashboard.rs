//! Dashboard renderer
//!
//! Pure read: navigation-passed state wins, the session context is the
//! fallback, and having neither is an empty state rather than an error.

use aerisk_common::prediction::{format_predictions, risk_display};
use aerisk_common::{PredictionResult, RiskTier, SessionContext};
use std::fmt::Write as _;
use tracing::warn;

pub const DEFAULT_FILE_NAME: &str = "Uploaded CSV";
pub const SUMMARY_PLACEHOLDER: &str = "Summary details will appear here once the model responds.";
pub const PREDICTION_PLACEHOLDER: &str = "Prediction output will be listed here.";

/// State handed over directly by the upload flow
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationState {
    pub result: PredictionResult,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dashboard {
    /// Nothing to show; offer the way back to the upload flow
    Empty,
    Results(DashboardData),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardData {
    pub file_name: String,
    pub result: PredictionResult,
}

impl Dashboard {
    pub fn resolve(navigation: Option<NavigationState>, session: &SessionContext) -> Self {
        // Navigation state is used whole; never pair it with a session filename
        if let Some(nav) = navigation {
            return Dashboard::Results(DashboardData {
                file_name: nav
                    .file_name
                    .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
                result: nav.result,
            });
        }

        match session.snapshot() {
            Ok(Some(snapshot)) => Dashboard::Results(DashboardData {
                file_name: snapshot
                    .file_name
                    .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
                result: snapshot.result,
            }),
            Ok(None) => Dashboard::Empty,
            Err(e) => {
                warn!("Stored prediction result is unreadable: {}", e);
                Dashboard::Empty
            }
        }
    }

    /// Render as terminal text; `color` enables ANSI styling of the risk line
    pub fn render(&self, color: bool) -> String {
        match self {
            Dashboard::Empty => render_empty(),
            Dashboard::Results(data) => data.render(color),
        }
    }
}

impl DashboardData {
    pub fn summary_text(&self) -> &str {
        self.result.summary().unwrap_or(SUMMARY_PLACEHOLDER)
    }

    pub fn risk_tier(&self) -> RiskTier {
        RiskTier::classify(self.result.risk_level())
    }

    pub fn risk_text(&self) -> &str {
        risk_display(self.result.risk_level())
    }

    pub fn prediction_lines(&self) -> Vec<String> {
        match self.result.prediction() {
            Some(prediction) => {
                let lines = format_predictions(prediction);
                if lines.is_empty() {
                    vec![PREDICTION_PLACEHOLDER.to_string()]
                } else {
                    lines
                }
            }
            None => vec![PREDICTION_PLACEHOLDER.to_string()],
        }
    }

    fn render(&self, color: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Prediction Dashboard");
        let _ = writeln!(out, "Results generated for: {}", self.file_name);
        let _ = writeln!(out);

        section(&mut out, "Summary");
        let _ = writeln!(out, "{}", self.summary_text());

        section(&mut out, "Model");
        let _ = writeln!(out, "{}", self.result.model().unwrap_or("Unknown"));
        if let Some(rows) = self.result.rows() {
            let _ = writeln!(out, "Rows analysed: {}", rows);
        }

        section(&mut out, "Risk Level");
        let tier = self.risk_tier();
        if color {
            let _ = writeln!(out, "\x1b[1;{}m{}\x1b[0m", tier.ansi_code(), self.risk_text());
        } else {
            let _ = writeln!(out, "{}", self.risk_text());
        }

        section(&mut out, "Prediction Output");
        for line in self.prediction_lines() {
            let _ = writeln!(out, "{}", line);
        }

        section(&mut out, "Raw Response");
        let _ = writeln!(out, "{}", self.result.to_pretty_json());
        out
    }
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "== {} ==", title);
}

fn render_empty() -> String {
    "No results yet\n\
     Upload a CSV file to generate predictions:\n  \
     aerisk submit <FILE> --analysis <TYPE>\n"
        .to_string()
}
