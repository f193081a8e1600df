//! Prediction result model and display rules
//!
//! The backend returns an arbitrary JSON object. A handful of fields are
//! interpreted (`summary`, `prediction`, `risk_level`, `model`, `rows`);
//! everything else is preserved verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unit shown for RUL entries that do not carry one
pub const DEFAULT_RUL_UNIT: &str = "cycles";

/// Opaque prediction response from the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionResult(Map<String, Value>);

impl PredictionResult {
    /// Build from a decoded JSON value; non-objects are rejected
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn summary(&self) -> Option<&str> {
        self.str_field("summary")
    }

    pub fn model(&self) -> Option<&str> {
        self.str_field("model")
    }

    pub fn rows(&self) -> Option<u64> {
        self.0.get("rows").and_then(Value::as_u64)
    }

    /// Free-text risk level (`risk_level`, falling back to `risk`)
    pub fn risk_level(&self) -> Option<&str> {
        self.str_field("risk_level").or_else(|| self.str_field("risk"))
    }

    /// Prediction payload (`prediction`, falling back to `result`)
    pub fn prediction(&self) -> Option<&Value> {
        self.0
            .get("prediction")
            .filter(|v| !v.is_null())
            .or_else(|| self.0.get("result").filter(|v| !v.is_null()))
    }

    /// Pretty-printed raw response
    pub fn to_pretty_json(&self) -> String {
        // Map<String, Value> serialization cannot fail
        serde_json::to_string_pretty(&self.0).unwrap_or_default()
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Three-tier severity classification of a free-text risk level
///
/// Substring match: "Low" is positive, "Medium" is cautionary, any other
/// non-empty text is severe. Absent text is neutral (shown as "N/A").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Positive,
    Cautionary,
    Severe,
    Neutral,
}

impl RiskTier {
    pub fn classify(risk_level: Option<&str>) -> Self {
        match risk_level.map(str::trim) {
            None | Some("") => RiskTier::Neutral,
            Some(text) if text.contains("Low") => RiskTier::Positive,
            Some(text) if text.contains("Medium") => RiskTier::Cautionary,
            Some(_) => RiskTier::Severe,
        }
    }

    /// RGB fill (0.0-1.0) used by the report
    pub fn rgb(self) -> (f32, f32, f32) {
        match self {
            RiskTier::Positive => (0.13, 0.55, 0.13),
            RiskTier::Cautionary => (0.85, 0.55, 0.0),
            RiskTier::Severe => (0.8, 0.1, 0.1),
            RiskTier::Neutral => (0.4, 0.4, 0.4),
        }
    }

    /// ANSI SGR color code used by the terminal dashboard
    pub fn ansi_code(self) -> &'static str {
        match self {
            RiskTier::Positive => "32",
            RiskTier::Cautionary => "33",
            RiskTier::Severe => "31",
            RiskTier::Neutral => "90",
        }
    }
}

/// Text shown for a risk level, "N/A" when absent
pub fn risk_display(risk_level: Option<&str>) -> &str {
    match risk_level.map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => "N/A",
    }
}

/// Format a prediction payload into display lines
///
/// Precedence for sequences: RUL entries (first element has `rul`), then
/// fault entries (first element has `fault_code` or `fault_name`), then each
/// element serialized. Non-sequences are serialized directly, pretty-printed.
pub fn format_predictions(prediction: &Value) -> Vec<String> {
    let Value::Array(items) = prediction else {
        return match prediction {
            Value::String(text) => text.lines().map(str::to_string).collect(),
            other => serde_json::to_string_pretty(other)
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect(),
        };
    };

    let first = items.first();
    let has_field = |key: &str| first.and_then(|v| v.get(key)).is_some();

    if has_field("rul") {
        return items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let rul = item.get("rul").map(scalar_text).unwrap_or_else(|| "N/A".to_string());
                let unit = item
                    .get("unit")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_RUL_UNIT);
                format!("[{}] RUL: {} {}", i + 1, rul, unit)
            })
            .collect();
    }

    if has_field("fault_code") || has_field("fault_name") {
        return items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let label = item
                    .get("fault_name")
                    .filter(|v| !v.is_null())
                    .or_else(|| item.get("fault_code").filter(|v| !v.is_null()))
                    .map(scalar_text)
                    .unwrap_or_else(|| scalar_text(item));
                format!("[{}] {}", i + 1, label)
            })
            .collect();
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("[{}] {}", i + 1, scalar_text(item)))
        .collect()
}

/// Strings render bare, everything else as compact JSON
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(value: Value) -> PredictionResult {
        PredictionResult::from_value(value).unwrap()
    }

    #[test]
    fn test_risk_tier_classification() {
        assert_eq!(RiskTier::classify(Some("Low")), RiskTier::Positive);
        assert_eq!(RiskTier::classify(Some("Medium Risk")), RiskTier::Cautionary);
        assert_eq!(RiskTier::classify(Some("High")), RiskTier::Severe);
        assert_eq!(RiskTier::classify(Some("Critical")), RiskTier::Severe);
        assert_eq!(RiskTier::classify(Some("  ")), RiskTier::Neutral);
        assert_eq!(RiskTier::classify(None), RiskTier::Neutral);
    }

    #[test]
    fn test_risk_classification_is_case_sensitive() {
        // Product rule: substring match on the capitalized keyword only
        assert_eq!(RiskTier::classify(Some("low")), RiskTier::Severe);
    }

    #[test]
    fn test_risk_display_defaults_to_na() {
        assert_eq!(risk_display(None), "N/A");
        assert_eq!(risk_display(Some("Medium")), "Medium");
    }

    #[test]
    fn test_format_rul_entries() {
        let lines = format_predictions(&json!([
            {"rul": 45, "unit": "cycles"},
            {"rul": 12.5},
            {"rul": 3, "unit": "flights"}
        ]));
        assert_eq!(
            lines,
            vec!["[1] RUL: 45 cycles", "[2] RUL: 12.5 cycles", "[3] RUL: 3 flights"]
        );
    }

    #[test]
    fn test_format_fault_entries_prefer_name() {
        let lines = format_predictions(&json!([
            {"fault_code": "F12", "fault_name": "Seal Wear"},
            {"fault_code": "F07"}
        ]));
        assert_eq!(lines, vec!["[1] Seal Wear", "[2] F07"]);
    }

    #[test]
    fn test_format_plain_sequence() {
        let lines = format_predictions(&json!([0, "Healthy", {"score": 0.9}]));
        assert_eq!(lines, vec!["[1] 0", "[2] Healthy", "[3] {\"score\":0.9}"]);
    }

    #[test]
    fn test_format_non_sequence() {
        assert_eq!(
            format_predictions(&json!("Analysis complete.")),
            vec!["Analysis complete."]
        );
        assert_eq!(
            format_predictions(&json!({"status": "ok"})),
            vec!["{", "  \"status\": \"ok\"", "}"]
        );
    }

    #[test]
    fn test_accessors_and_fallbacks() {
        let r = result(json!({
            "model": "m1",
            "rows": 120,
            "risk": "Low",
            "result": "done",
            "extra": [1, 2]
        }));
        assert_eq!(r.model(), Some("m1"));
        assert_eq!(r.rows(), Some(120));
        assert_eq!(r.risk_level(), Some("Low"));
        assert_eq!(r.prediction(), Some(&json!("done")));
        assert_eq!(r.get("extra"), Some(&json!([1, 2])));
        assert_eq!(r.summary(), None);
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(PredictionResult::from_value(json!([1, 2])).is_none());
    }
}
