//! Analysis-type catalog
//!
//! Each analysis type selects a backend model and the CSV columns that
//! model expects.

use serde::Serialize;

const CMAPSS_COLUMNS: &[&str] = &[
    "engine_id", "cycle", "op1", "op2", "op3", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "s8",
    "s9", "s10", "s11", "s12", "s13", "s14", "s15", "s16", "s17", "s18", "s19", "s20", "s21",
];

const LANDING_GEAR_COLUMNS: &[&str] = &[
    "Max_Deflection",
    "Max_Velocity",
    "Settling_Time",
    "Mass",
    "K_Stiffness",
    "B_Damping",
];

const DURABILITY_COLUMNS: &[&str] = &[
    "Material_Type",
    "Temperature",
    "Pressure",
    "Stress_Level",
    "Cycle_Count",
    "Environmental_Factor",
];

/// A user-selectable analysis category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisType {
    /// Selection key (also persisted as `analysisType`)
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    /// Backend model identifier used in `POST /predict/{model}`
    pub model_name: &'static str,
    pub required_fields: &'static [&'static str],
}

/// Key selected when the user makes no choice
pub const DEFAULT_ANALYSIS_KEY: &str = "remaining_useful_life";

pub const ANALYSIS_TYPES: &[AnalysisType] = &[
    AnalysisType {
        key: "remaining_useful_life",
        label: "Remaining Useful Life (RUL) - LSTM",
        description: "Predicts remaining operational cycles using LSTM deep learning. \
                      Requires CMAPSS format sensor data with minimum 30 rows.",
        model_name: "remaining_useful_life",
        required_fields: CMAPSS_COLUMNS,
    },
    AnalysisType {
        key: "engine_maintenance",
        label: "Engine Maintenance Risk",
        description: "Assesses engine maintenance requirements (Healthy/Maintenance/Replace). \
                      Uses custom feature extraction from a 30-cycle sensor window.",
        model_name: "engine_maintenance",
        required_fields: CMAPSS_COLUMNS,
    },
    AnalysisType {
        key: "landing_gear_fault",
        label: "Landing Gear Fault Prediction",
        description: "Detects landing gear faults (gas leaks, seal wear, degradation)",
        model_name: "landing_gear_fault",
        required_fields: LANDING_GEAR_COLUMNS,
    },
    AnalysisType {
        key: "landing_gear_rul",
        label: "Landing Gear RUL",
        description: "Predicts remaining useful life cycles for landing gear components",
        model_name: "landing_gear_rul",
        required_fields: LANDING_GEAR_COLUMNS,
    },
    AnalysisType {
        key: "durability",
        label: "Structural Durability Assessment",
        description: "Evaluates structural component durability and degradation status",
        model_name: "durability",
        required_fields: DURABILITY_COLUMNS,
    },
];

impl AnalysisType {
    /// Look up an analysis type by selection key
    pub fn find(key: &str) -> Option<&'static AnalysisType> {
        ANALYSIS_TYPES.iter().find(|t| t.key == key)
    }

    pub fn default_type() -> &'static AnalysisType {
        &ANALYSIS_TYPES[0]
    }

    /// Required columns absent from a CSV header line
    ///
    /// Header cells are trimmed and unquoted before comparison. Comparison is
    /// case-sensitive, matching the backend loaders.
    pub fn missing_columns(&self, header_line: &str) -> Vec<&'static str> {
        let present: Vec<&str> = header_line
            .split(',')
            .map(|cell| cell.trim().trim_matches('"'))
            .collect();

        self.required_fields
            .iter()
            .copied()
            .filter(|field| !present.contains(field))
            .collect()
    }
}

/// All backend model names known to the catalog, in catalog order
pub fn catalog_model_names() -> Vec<&'static str> {
    ANALYSIS_TYPES.iter().map(|t| t.model_name).collect()
}
