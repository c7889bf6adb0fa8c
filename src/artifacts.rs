//! Serving Artifact Loading
//!
//! The training binary (`failsight-train`) writes every serving artifact as
//! JSON under a models directory plus a cleaned CSV under a data directory.
//! This module owns the artifact schema and the startup load.
//!
//! Loading is per-artifact fallible: a missing or corrupt file logs a warning
//! and leaves that capability disabled, so the server still starts and the
//! affected tools answer with structured errors instead of crashing the
//! process.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::Dataset;
use crate::ml::{Classifier, LabelEncoder, Regressor};

/// Artifact filenames under the models directory.
pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const REGRESSOR_FILE: &str = "regressor.json";
pub const CLASSIFIER_IMPORTANCES_FILE: &str = "classifier_importances.json";
pub const REGRESSOR_IMPORTANCES_FILE: &str = "regressor_importances.json";
pub const TYPE_ENCODER_FILE: &str = "type_encoder.json";
pub const FEATURES_INFO_FILE: &str = "features_info.json";

/// Cleaned dataset filename under the data directory.
pub const CLEANED_DATASET_FILE: &str = "predictive_maintenance_cleaned.csv";

/// Feature names, alias table, and prompt text produced at training time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesInfo {
    /// Classification features, original column names.
    pub classification_features: Vec<String>,
    /// Regression features, original column names.
    pub regression_features: Vec<String>,
    /// Classification features with `[`, `]`, `<` stripped — the exact
    /// order/names the classifier was fitted with.
    pub classification_features_cleaned: Vec<String>,
    /// Regression features with `[`, `]`, `<` stripped.
    pub regression_features_cleaned: Vec<String>,
    /// All columns of the cleaned serving dataset.
    pub original_columns: Vec<String>,
    /// Lowercase synonym -> canonical column name.
    pub column_aliases: BTreeMap<String, String>,
    /// Dataset-context block injected into the system instruction.
    pub columns_prompt: String,
}

impl FeaturesInfo {
    /// Alias lookup: lowercased and trimmed. Returns the canonical column
    /// name if the synonym is known.
    pub fn canonical(&self, name: &str) -> Option<&str> {
        self.column_aliases
            .get(&name.trim().to_lowercase())
            .map(String::as_str)
    }
}

/// Everything the prediction service needs, loaded once at startup.
/// Fields are `None` when the corresponding artifact failed to load.
#[derive(Debug, Clone, Default)]
pub struct ModelArtifacts {
    pub classifier: Option<Classifier>,
    pub regressor: Option<Regressor>,
    pub classifier_importances: Option<BTreeMap<String, f64>>,
    pub regressor_importances: Option<BTreeMap<String, f64>>,
    pub type_encoder: Option<LabelEncoder>,
    pub features: Option<FeaturesInfo>,
    pub dataset: Option<Dataset>,
}

impl ModelArtifacts {
    /// Load all artifacts, degrading per-file on failure.
    pub fn load(models_dir: &Path, data_csv: &Path) -> Self {
        let classifier: Option<Classifier> = load_json(&models_dir.join(CLASSIFIER_FILE));
        let regressor: Option<Regressor> = load_json(&models_dir.join(REGRESSOR_FILE));
        let classifier_importances =
            load_json(&models_dir.join(CLASSIFIER_IMPORTANCES_FILE));
        let regressor_importances =
            load_json(&models_dir.join(REGRESSOR_IMPORTANCES_FILE));
        let type_encoder: Option<LabelEncoder> = load_json(&models_dir.join(TYPE_ENCODER_FILE));
        let mut features: Option<FeaturesInfo> = load_json(&models_dir.join(FEATURES_INFO_FILE));

        // The web UI refers to the failure flag as "machine failure"; the
        // column is named Target in the dataset.
        if let Some(info) = features.as_mut() {
            info.column_aliases
                .insert("machine failure".to_string(), "Target".to_string());
        }

        let dataset = match Dataset::from_csv_path(data_csv) {
            Ok(ds) => {
                info!(rows = ds.rows(), path = %data_csv.display(), "analysis dataset loaded");
                Some(ds)
            }
            Err(e) => {
                warn!(path = %data_csv.display(), error = %e, "analysis dataset unavailable");
                None
            }
        };

        let loaded = Self {
            classifier,
            regressor,
            classifier_importances,
            regressor_importances,
            type_encoder,
            features,
            dataset,
        };

        if loaded.classifier.is_some() && loaded.regressor.is_some() {
            info!(
                classifier = loaded.classifier.as_ref().map(Classifier::name),
                regressor = loaded.regressor.as_ref().map(Regressor::name),
                "prediction models loaded"
            );
        } else {
            warn!("one or more models missing — run failsight-train first; prediction tools degraded");
        }

        loaded
    }
}

/// Read + deserialize one JSON artifact; `None` (with a warning) on any
/// failure.
fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "artifact failed to parse");
                None
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "artifact not readable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn sample_features_info() -> FeaturesInfo {
        let mut aliases = BTreeMap::new();
        aliases.insert("rpm".to_string(), "Rotational speed [rpm]".to_string());
        aliases.insert("torque".to_string(), "Torque [Nm]".to_string());
        FeaturesInfo {
            classification_features: vec!["Type".into(), "Torque [Nm]".into()],
            regression_features: vec!["Type".into()],
            classification_features_cleaned: vec!["Type".into(), "Torque Nm".into()],
            regression_features_cleaned: vec!["Type".into()],
            original_columns: vec!["Type".into(), "Torque [Nm]".into(), "Target".into()],
            column_aliases: aliases,
            columns_prompt: "columns".into(),
        }
    }

    #[test]
    fn test_canonical_lookup_trims_and_lowercases() {
        let info = sample_features_info();
        assert_eq!(info.canonical("  RPM  "), Some("Rotational speed [rpm]"));
        assert_eq!(info.canonical("Torque"), Some("Torque [Nm]"));
        assert_eq!(info.canonical("nope"), None);
    }

    #[test]
    fn test_load_missing_dir_degrades_everything() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ModelArtifacts::load(
            &dir.path().join("does-not-exist"),
            &dir.path().join("missing.csv"),
        );
        assert!(artifacts.classifier.is_none());
        assert!(artifacts.regressor.is_none());
        assert!(artifacts.type_encoder.is_none());
        assert!(artifacts.features.is_none());
        assert!(artifacts.dataset.is_none());
    }

    #[test]
    fn test_load_partial_artifacts_and_failure_alias() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        fs::create_dir_all(&models).unwrap();

        let info = sample_features_info();
        fs::write(
            models.join(FEATURES_INFO_FILE),
            serde_json::to_string(&info).unwrap(),
        )
        .unwrap();

        let csv_path = dir.path().join(CLEANED_DATASET_FILE);
        let mut csv = fs::File::create(&csv_path).unwrap();
        writeln!(csv, "Type,Torque [Nm],Target").unwrap();
        writeln!(csv, "L,40.0,0").unwrap();

        let artifacts = ModelArtifacts::load(&models, &csv_path);
        assert!(artifacts.classifier.is_none());
        let features = artifacts.features.unwrap();
        assert_eq!(features.canonical("machine failure"), Some("Target"));
        assert_eq!(artifacts.dataset.unwrap().rows(), 1);
    }

    #[test]
    fn test_corrupt_artifact_is_none() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CLASSIFIER_FILE), "{not json").unwrap();
        let out: Option<Classifier> = load_json(&dir.path().join(CLASSIFIER_FILE));
        assert!(out.is_none());
    }
}
