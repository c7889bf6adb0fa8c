//! k-Nearest-Neighbors Classifier
//!
//! Lazy candidate model: stores the standardized training set and scores a
//! query as the positive fraction among its k nearest Euclidean neighbors.
//! Provides no feature importances (reported as zeros).

use serde::{Deserialize, Serialize};

use super::scale::Scaler;

/// kNN over standardized features (k = 5 in the candidate set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    scaler: Scaler,
    k: usize,
    points: Vec<Vec<f64>>,
    labels: Vec<usize>,
}

impl KnnClassifier {
    /// "Fit" by standardizing and retaining the training set.
    pub fn fit(x: &[Vec<f64>], y: &[usize], k: usize) -> Self {
        let scaler = Scaler::fit(x);
        Self {
            points: scaler.transform_all(x),
            labels: y.to_vec(),
            scaler,
            k: k.max(1),
        }
    }

    /// Positive-class fraction among the k nearest neighbors.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        let query = self.scaler.transform(row);

        let mut distances: Vec<(f64, usize)> = self
            .points
            .iter()
            .zip(&self.labels)
            .map(|(p, &label)| (squared_distance(p, &query), label))
            .collect();
        distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let k = self.k.min(distances.len());
        let positives = distances[..k].iter().filter(|(_, l)| *l == 1).count();
        positives as f64 / k as f64
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
