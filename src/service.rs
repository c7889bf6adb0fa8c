//! Prediction Service
//!
//! The four local tools the assistant can invoke: failure/wear prediction,
//! feature-importance explanation, dataset summary, and distribution plots.
//!
//! Every operation returns a `String` holding JSON — a success payload or an
//! `{"error": "..."}` object. Errors at this boundary are data fed back to
//! the model so it can self-correct; they are never Rust errors. The service
//! is immutable after construction and shared via `Arc` across requests.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::artifacts::ModelArtifacts;
use crate::plot::PlotRenderer;

/// Tool-wear limit used to derive remaining useful life, in minutes.
pub const RUL_LIMIT_THRESHOLD: f64 = 240.0;

/// Structured output of the prediction tool.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    pub probability_of_failure: f64,
    pub predicted_tool_wear_min: f64,
    pub estimated_rul_min: f64,
    pub rul_limit_threshold: f64,
}

/// Read-only serving facade over the loaded artifacts and plot renderer.
pub struct PredictionService {
    artifacts: ModelArtifacts,
    renderer: PlotRenderer,
    base_url: String,
}

impl PredictionService {
    pub fn new(artifacts: ModelArtifacts, renderer: PlotRenderer, base_url: String) -> Self {
        Self {
            artifacts,
            renderer,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public URL for a generated plot file.
    fn image_url(&self, filename: &str) -> String {
        format!("{}/static/{}", self.base_url, filename)
    }

    /// Whether both models came up at startup. Health reporting only; each
    /// tool degrades on its own when an artifact is missing.
    pub fn models_loaded(&self) -> bool {
        self.artifacts.classifier.is_some() && self.artifacts.regressor.is_some()
    }

    // ========================================================================
    // Tool: run_prediction
    // ========================================================================

    /// Run both models on one machine reading.
    ///
    /// Classification uses all six features, regression the first five
    /// (tool wear is its target). RUL is the wear limit minus predicted
    /// wear, clamped at zero.
    pub fn run_prediction(
        &self,
        type_machine: &str,
        air_temp_k: f64,
        process_temp_k: f64,
        rotation_rpm: f64,
        torque_nm: f64,
        tool_wear_min: f64,
    ) -> String {
        let (Some(classifier), Some(regressor), Some(encoder)) = (
            self.artifacts.classifier.as_ref(),
            self.artifacts.regressor.as_ref(),
            self.artifacts.type_encoder.as_ref(),
        ) else {
            return error_json("ML models are not loaded on the server.");
        };

        let type_encoded = match encoder.transform(type_machine.trim()) {
            Ok(code) => code as f64,
            Err(_) => {
                return error_json(&format!(
                    "Machine type '{}' is invalid. Use one of: {}.",
                    type_machine,
                    encoder.classes().join(", ")
                ));
            }
        };

        let class_row = [
            type_encoded,
            air_temp_k,
            process_temp_k,
            rotation_rpm,
            torque_nm,
            tool_wear_min,
        ];
        let reg_row = &class_row[..5];

        let probability = classifier.predict_proba(&class_row).clamp(0.0, 1.0);
        let predicted_wear = regressor.predict(reg_row).max(0.0);

        let result = PredictionResult {
            probability_of_failure: probability,
            predicted_tool_wear_min: predicted_wear,
            estimated_rul_min: (RUL_LIMIT_THRESHOLD - predicted_wear).max(0.0),
            rul_limit_threshold: RUL_LIMIT_THRESHOLD,
        };
        serde_json::to_string(&result)
            .unwrap_or_else(|e| error_json(&format!("Failed to encode prediction: {e}")))
    }

    // ========================================================================
    // Tool: generate_explanation
    // ========================================================================

    /// Render a feature-importance chart for the chosen model and return its
    /// public URL.
    pub fn generate_explanation(&self, model_to_explain: &str) -> String {
        let (importances, title) = match model_to_explain.trim().to_lowercase().as_str() {
            "classification" => (
                self.artifacts.classifier_importances.as_ref(),
                "Failure Prediction (Classification)",
            ),
            "regression" => (
                self.artifacts.regressor_importances.as_ref(),
                "Tool Wear Prediction (Regression)",
            ),
            _ => {
                return error_json("Unknown model. Use 'classification' or 'regression'.");
            }
        };

        let Some(importances) = importances else {
            return error_json("Feature importances are not loaded on the server.");
        };

        match self.renderer.feature_importance(importances, title) {
            Ok(filename) => json!({ "image_url": self.image_url(&filename) }).to_string(),
            Err(e) => {
                warn!(error = %e, "explanation plot failed");
                error_json(&format!("Failed to render explanation chart: {e}"))
            }
        }
    }

    // ========================================================================
    // Tool: get_dataset_summary
    // ========================================================================

    /// Record count, machine type / failure counts, and descriptive
    /// statistics for every numeric column.
    pub fn get_dataset_summary(&self) -> String {
        let Some(dataset) = self.artifacts.dataset.as_ref() else {
            return error_json("The analysis dataset is not loaded on the server.");
        };

        let type_counts = counts_map(dataset.value_counts("Type"));
        let failure_counts = counts_map(dataset.value_counts("Target"));

        let mut statistics = BTreeMap::new();
        for name in dataset.numeric_names() {
            if let Some(summary) = dataset.numeric_summary(&name) {
                statistics.insert(name, summary);
            }
        }

        json!({
            "total_records": dataset.rows(),
            "machine_type_counts": type_counts,
            "failure_counts (0=No, 1=Yes)": failure_counts,
            "numeric_statistics": statistics,
        })
        .to_string()
    }

    // ========================================================================
    // Tool: plot_data_distribution
    // ========================================================================

    /// Plot the distribution of a column, resolving human-language synonyms
    /// through the alias table first and exact column names second.
    pub fn plot_data_distribution(&self, column_name: &str, hue_column: Option<&str>) -> String {
        let Some(dataset) = self.artifacts.dataset.as_ref() else {
            return error_json("The analysis dataset is not loaded on the server.");
        };

        let Some(column) = self.resolve_column(column_name) else {
            return error_json(&format!("Column '{column_name}' not found."));
        };

        let hue = match hue_column.map(str::trim).filter(|h| !h.is_empty()) {
            None => None,
            Some(h) => match self.resolve_column(h) {
                Some(resolved) => Some(resolved),
                None => return error_json(&format!("Hue column '{h}' not found.")),
            },
        };

        match self.renderer.distribution(dataset, &column, hue.as_deref()) {
            Ok(filename) => json!({ "image_url": self.image_url(&filename) }).to_string(),
            Err(e) => {
                warn!(column = %column, error = %e, "distribution plot failed");
                error_json(&format!("Failed to render chart: {e}"))
            }
        }
    }

    /// Alias table first (case-insensitive, trimmed), then exact match
    /// against the dataset schema. Alias hits are verified against the
    /// schema so a stale alias can never name a missing column.
    fn resolve_column(&self, name: &str) -> Option<String> {
        let dataset = self.artifacts.dataset.as_ref()?;

        if let Some(features) = self.artifacts.features.as_ref() {
            if let Some(canonical) = features.canonical(name) {
                if dataset.has_column(canonical) {
                    return Some(canonical.to_string());
                }
            }
        }

        let exact = name.trim();
        if dataset.has_column(exact) {
            return Some(exact.to_string());
        }
        None
    }

    /// The columns-context prompt produced at training time, if loaded.
    pub fn columns_prompt(&self) -> Option<&str> {
        self.artifacts
            .features
            .as_ref()
            .map(|f| f.columns_prompt.as_str())
    }
}

fn error_json(message: &str) -> String {
    json!({ "error": message }).to_string()
}

fn counts_map(counts: Option<Vec<(String, usize)>>) -> BTreeMap<String, usize> {
    counts.unwrap_or_default().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::FeaturesInfo;
    use crate::dataset::Dataset;
    use crate::ml::{
        Classifier, DecisionTree, LabelEncoder, LogisticRegressionModel, Regressor, TreeKind,
        TreeParams,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write as _;

    /// Small but realistic service: models trained on synthetic data shaped
    /// like the AI4I columns, dataset with aliases, tempdir renderer.
    fn build_service(dir: &tempfile::TempDir) -> PredictionService {
        // Failure correlates with tool wear (feature 5).
        let x: Vec<Vec<f64>> = (0..200)
            .map(|i| {
                vec![
                    (i % 3) as f64,
                    298.0 + (i % 10) as f64 * 0.2,
                    308.0 + (i % 10) as f64 * 0.2,
                    1400.0 + (i % 50) as f64 * 4.0,
                    35.0 + (i % 20) as f64 * 0.5,
                    i as f64,
                ]
            })
            .collect();
        let y: Vec<usize> = (0..200).map(|i| usize::from(i >= 150)).collect();
        let classifier =
            Classifier::LogisticRegression(LogisticRegressionModel::fit(&x, &y, 500, 0.5));

        let reg_x: Vec<Vec<f64>> = x.iter().map(|r| r[..5].to_vec()).collect();
        let reg_y: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let regressor = Regressor::DecisionTree(DecisionTree::fit(
            &reg_x,
            &reg_y,
            TreeKind::Variance,
            TreeParams::default(),
            &mut rng,
        ));

        let encoder = LabelEncoder::fit(&["L".into(), "M".into(), "H".into()]);

        let mut aliases = BTreeMap::new();
        aliases.insert("type".to_string(), "Type".to_string());
        aliases.insert("rpm".to_string(), "Rotational speed [rpm]".to_string());
        aliases.insert("torque".to_string(), "Torque [Nm]".to_string());
        aliases.insert("wear".to_string(), "Tool wear [min]".to_string());
        let features = FeaturesInfo {
            classification_features: vec![],
            regression_features: vec![],
            classification_features_cleaned: vec![],
            regression_features_cleaned: vec![],
            original_columns: vec![],
            column_aliases: aliases,
            columns_prompt: "DATASET CONTEXT".into(),
        };

        let csv_path = dir.path().join("data.csv");
        let mut csv = std::fs::File::create(&csv_path).unwrap();
        writeln!(
            csv,
            "Type,Air temperature [K],Process temperature [K],Rotational speed [rpm],Torque [Nm],Tool wear [min],Target"
        )
        .unwrap();
        for i in 0..100 {
            writeln!(
                csv,
                "{},{:.1},{:.1},{},{:.1},{},{}",
                ["L", "M", "H"][i % 3],
                298.0 + i as f64 * 0.05,
                308.0 + i as f64 * 0.05,
                1400 + i * 3,
                35.0 + i as f64 * 0.2,
                i,
                u8::from(i >= 90)
            )
            .unwrap();
        }
        drop(csv);

        let mut importances = BTreeMap::new();
        importances.insert("Tool wear min".to_string(), 0.7);
        importances.insert("Torque Nm".to_string(), 0.3);

        let artifacts = ModelArtifacts {
            classifier: Some(classifier),
            regressor: Some(regressor),
            classifier_importances: Some(importances.clone()),
            regressor_importances: Some(importances),
            type_encoder: Some(encoder),
            features: Some(features),
            dataset: Some(Dataset::from_csv_path(&csv_path).unwrap()),
        };

        let renderer = PlotRenderer::new(dir.path().join("static")).unwrap();
        PredictionService::new(artifacts, renderer, "http://localhost:8000".into())
    }

    fn parse(raw: &str) -> serde_json::Value {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_prediction_invariants() {
        let dir = tempfile::tempdir().unwrap();
        let service = build_service(&dir);

        for ty in ["L", "M", "H"] {
            let out = parse(&service.run_prediction(ty, 298.1, 308.6, 1551.0, 42.8, 0.0));
            let p = out["probability_of_failure"].as_f64().unwrap();
            let wear = out["predicted_tool_wear_min"].as_f64().unwrap();
            let rul = out["estimated_rul_min"].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&p));
            assert!(wear >= 0.0);
            assert!((rul - (240.0 - wear).max(0.0)).abs() < 1e-9);
            assert_eq!(out["rul_limit_threshold"].as_f64().unwrap(), 240.0);
        }
    }

    #[test]
    fn test_prediction_unknown_type_is_structured_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = build_service(&dir);

        let out = parse(&service.run_prediction("X", 298.1, 308.6, 1551.0, 42.8, 0.0));
        let msg = out["error"].as_str().unwrap();
        assert!(msg.contains("'X'"));
        assert!(msg.contains("invalid"));
    }

    #[test]
    fn test_prediction_degraded_without_models() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PlotRenderer::new(dir.path().join("static")).unwrap();
        let service = PredictionService::new(
            ModelArtifacts::default(),
            renderer,
            "http://localhost:8000".into(),
        );

        let out = parse(&service.run_prediction("L", 298.1, 308.6, 1551.0, 42.8, 0.0));
        assert!(out["error"].as_str().unwrap().contains("not loaded"));
    }

    #[test]
    fn test_explanation_returns_image_url_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let service = build_service(&dir);

        let out = parse(&service.generate_explanation("Classification"));
        let url = out["image_url"].as_str().unwrap();
        assert!(url.starts_with("http://localhost:8000/static/plot_xai_"));

        let filename = url.rsplit('/').next().unwrap();
        assert!(dir.path().join("static").join(filename).exists());
    }

    #[test]
    fn test_explanation_unknown_selector() {
        let dir = tempfile::tempdir().unwrap();
        let service = build_service(&dir);

        let out = parse(&service.generate_explanation("clustering"));
        assert!(out["error"]
            .as_str()
            .unwrap()
            .contains("'classification' or 'regression'"));
    }

    #[test]
    fn test_summary_shape() {
        let dir = tempfile::tempdir().unwrap();
        let service = build_service(&dir);

        let out = parse(&service.get_dataset_summary());
        assert_eq!(out["total_records"].as_u64().unwrap(), 100);
        assert!(out["machine_type_counts"]["L"].as_u64().unwrap() > 0);
        assert_eq!(
            out["failure_counts (0=No, 1=Yes)"]["1"].as_u64().unwrap(),
            10
        );
        let stats = &out["numeric_statistics"]["Torque [Nm]"];
        assert!(stats["mean"].as_f64().is_some());
        assert!(stats["25%"].as_f64().is_some());
    }

    #[test]
    fn test_distribution_alias_matches_exact_name() {
        let dir = tempfile::tempdir().unwrap();
        let service = build_service(&dir);

        assert_eq!(
            service.resolve_column("  TORQUE "),
            Some("Torque [Nm]".to_string())
        );
        assert_eq!(
            service.resolve_column("Torque [Nm]"),
            Some("Torque [Nm]".to_string())
        );
        assert_eq!(service.resolve_column("rpm"), service.resolve_column("Rotational speed [rpm]"));
    }

    #[test]
    fn test_distribution_unresolved_column_writes_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let service = build_service(&dir);

        let out = parse(&service.plot_data_distribution("no such column", None));
        assert!(out["error"].as_str().unwrap().contains("not found"));

        let static_dir = dir.path().join("static");
        assert_eq!(std::fs::read_dir(static_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_distribution_bad_hue_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = build_service(&dir);

        let out = parse(&service.plot_data_distribution("torque", Some("banana")));
        assert!(out["error"].as_str().unwrap().contains("Hue column"));
    }

    #[test]
    fn test_distribution_success_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let service = build_service(&dir);

        let out = parse(&service.plot_data_distribution("wear", Some("type")));
        let url = out["image_url"].as_str().unwrap();
        assert!(url.starts_with("http://localhost:8000/static/plot_dist_"));

        let filename = url.rsplit('/').next().unwrap();
        assert!(dir.path().join("static").join(filename).exists());
    }
}
