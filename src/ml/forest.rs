//! Random Forest Ensembles
//!
//! Bootstrap-aggregated CART trees with per-split feature subsampling:
//! sqrt(d) features for classification, d/3 for regression. Classification
//! output is the mean of leaf probabilities; importances average the member
//! trees' impurity decreases.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, TreeKind, TreeParams};

/// Forest hyperparameters (100 trees mirrors the candidate configuration
/// the pipeline was tuned against).
#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 12,
            min_samples_split: 4,
            seed: 42,
        }
    }
}

/// Fitted forest; works for both tasks depending on `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    kind: TreeKind,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Fit `n_estimators` trees on bootstrap resamples.
    pub fn fit(x: &[Vec<f64>], y: &[f64], kind: TreeKind, params: ForestParams) -> Self {
        let n = x.len();
        let d = x.first().map_or(0, Vec::len);
        let max_features = match kind {
            TreeKind::Gini => ((d as f64).sqrt().round() as usize).max(1),
            TreeKind::Variance => (d / 3).max(1),
        };
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            max_features: Some(max_features),
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let sample_x: Vec<Vec<f64>>;
            let sample_y: Vec<f64>;
            {
                let mut xs = Vec::with_capacity(n);
                let mut ys = Vec::with_capacity(n);
                for _ in 0..n {
                    let i = rng.gen_range(0..n);
                    xs.push(x[i].clone());
                    ys.push(y[i]);
                }
                sample_x = xs;
                sample_y = ys;
            }
            trees.push(DecisionTree::fit(
                &sample_x,
                &sample_y,
                kind,
                tree_params,
                &mut rng,
            ));
        }

        Self {
            kind,
            trees,
            n_features: d,
        }
    }

    /// Mean of member-tree outputs: a probability for gini forests, a point
    /// estimate for variance forests.
    pub fn predict(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        sum / self.trees.len() as f64
    }

    /// Mean per-feature impurity decrease, normalized to sum 1.
    pub fn importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (total, v) in totals.iter_mut().zip(tree.raw_importances()) {
                *total += v;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum == 0.0 {
            totals
        } else {
            totals.iter().map(|v| v / sum).collect()
        }
    }

    /// Number of member trees.
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Criterion this forest was grown with.
    pub fn kind(&self) -> TreeKind {
        self.kind
    }
}
