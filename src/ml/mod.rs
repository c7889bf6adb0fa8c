//! ML Engine
//!
//! Candidate models, selection metrics, and split helpers for the two
//! supervised tasks:
//!
//! - **Classification**: probability a machine fails, from logistic
//!   regression / kNN / random forest candidates (best macro F1 wins).
//! - **Regression**: predicted tool wear in minutes, from decision tree /
//!   random forest / linear regression candidates (best RMSE wins).
//!
//! Winning models serialize to JSON artifacts loaded read-only at serving
//! time. The enums below give the serving path a single dispatch point over
//! whichever candidate won.

pub mod encoder;
pub mod forest;
pub mod knn;
pub mod linear;
pub mod metrics;
pub mod scale;
pub mod split;
pub mod tree;

pub use encoder::{LabelEncoder, UnknownCategory};
pub use forest::{ForestParams, RandomForest};
pub use knn::KnnClassifier;
pub use linear::{LinearRegressionModel, LogisticRegressionModel};
pub use tree::{DecisionTree, TreeKind, TreeParams};

use serde::{Deserialize, Serialize};

/// Any fitted failure classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum Classifier {
    LogisticRegression(LogisticRegressionModel),
    KNearestNeighbors(KnnClassifier),
    RandomForest(RandomForest),
}

impl Classifier {
    /// Probability of the positive (failure) class.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        match self {
            Self::LogisticRegression(m) => m.predict_proba(row),
            Self::KNearestNeighbors(m) => m.predict_proba(row),
            Self::RandomForest(m) => m.predict(row),
        }
    }

    /// Candidate name for logs and training reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LogisticRegression(_) => "LogisticRegression",
            Self::KNearestNeighbors(_) => "kNN",
            Self::RandomForest(_) => "RandomForest",
        }
    }

    /// Normalized feature importances (zeros for kNN, which has none).
    pub fn importances(&self, n_features: usize) -> Vec<f64> {
        match self {
            Self::LogisticRegression(m) => m.importances(),
            Self::KNearestNeighbors(_) => vec![0.0; n_features],
            Self::RandomForest(m) => m.importances(),
        }
    }
}

/// Any fitted tool-wear regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum Regressor {
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    LinearRegression(LinearRegressionModel),
}

impl Regressor {
    /// Point estimate of tool wear in minutes.
    pub fn predict(&self, row: &[f64]) -> f64 {
        match self {
            Self::DecisionTree(m) => m.predict(row),
            Self::RandomForest(m) => m.predict(row),
            Self::LinearRegression(m) => m.predict(row),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DecisionTree(_) => "DecisionTree",
            Self::RandomForest(_) => "RandomForest",
            Self::LinearRegression(_) => "LinearRegression",
        }
    }

    pub fn importances(&self, _n_features: usize) -> Vec<f64> {
        match self {
            Self::DecisionTree(m) => m.importances(),
            Self::RandomForest(m) => m.importances(),
            Self::LinearRegression(m) => m.importances(),
        }
    }
}
