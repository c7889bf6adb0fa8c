//! CART Decision Trees
//!
//! Shared tree implementation for both tasks: gini impurity for binary
//! failure classification (leaf value = positive fraction, so the leaf is
//! directly a probability) and variance for tool-wear regression (leaf
//! value = mean). Nodes live in a flat arena so the serialized form is a
//! compact JSON vector.
//!
//! Feature importances are accumulated during fitting as impurity decrease
//! weighted by node population, then normalized by the forest/caller.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

/// Impurity criterion. For binary 0/1 targets gini reduces to `2p(1-p)`,
/// which like variance is a function of the first two moments — both
/// criteria share one split scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeKind {
    Gini,
    Variance,
}

/// Tuning knobs for tree growth.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features considered per split; `None` means all (single-tree mode).
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 12,
            min_samples_split: 4,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Fitted CART tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    kind: TreeKind,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Grow a tree on `(x, y)`. Classification callers encode labels as
    /// 0.0/1.0 so leaf means are probabilities.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        kind: TreeKind,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut tree = Self {
            kind,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        let indices: Vec<usize> = (0..x.len()).collect();
        tree.grow(x, y, &indices, 0, params, x.len().max(1), rng);
        tree
    }

    /// Predict by walking the arena from the root (node 0).
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row.get(*feature).copied().unwrap_or(f64::NAN) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Raw (unnormalized) impurity-decrease importances.
    pub fn raw_importances(&self) -> &[f64] {
        &self.importances
    }

    /// Importances normalized to sum 1 (zeros stay zeros).
    pub fn importances(&self) -> Vec<f64> {
        let total: f64 = self.importances.iter().sum();
        if total == 0.0 {
            self.importances.clone()
        } else {
            self.importances.iter().map(|v| v / total).collect()
        }
    }

    /// Node count (diagnostics/tests).
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Recursively grow a subtree over `indices`; returns the node index.
    #[allow(clippy::too_many_arguments)]
    fn grow(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        depth: usize,
        params: TreeParams,
        n_total: usize,
        rng: &mut StdRng,
    ) -> usize {
        let n = indices.len();
        let (sum, sumsq) = moments(y, indices);
        let node_impurity = impurity(self.kind, sum, sumsq, n as f64);
        let mean = if n > 0 { sum / n as f64 } else { 0.0 };

        if depth >= params.max_depth || n < params.min_samples_split || node_impurity <= 1e-12 {
            return self.push(Node::Leaf { value: mean });
        }

        let best = self.best_split(x, y, indices, node_impurity, params, rng);
        let Some((feature, threshold, gain)) = best else {
            return self.push(Node::Leaf { value: mean });
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[i][feature] <= threshold);
        if left_idx.is_empty() || right_idx.is_empty() {
            return self.push(Node::Leaf { value: mean });
        }

        self.importances[feature] += (n as f64 / n_total as f64) * gain;

        // Reserve the split slot before children so the root stays at 0.
        let node = self.push(Node::Leaf { value: mean });
        let left = self.grow(x, y, &left_idx, depth + 1, params, n_total, rng);
        let right = self.grow(x, y, &right_idx, depth + 1, params, n_total, rng);
        self.nodes[node] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node
    }

    /// Scan candidate features for the impurity-minimizing threshold.
    ///
    /// Returns `(feature, threshold, gain)` or `None` when no split improves.
    fn best_split(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        node_impurity: f64,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Option<(usize, f64, f64)> {
        let d = x.first().map_or(0, Vec::len);
        let n = indices.len() as f64;

        let candidates: Vec<usize> = match params.max_features {
            Some(m) if m < d => sample(rng, d, m).into_vec(),
            _ => (0..d).collect(),
        };

        let mut best: Option<(usize, f64, f64)> = None;

        for feature in candidates {
            let mut order: Vec<usize> = indices.to_vec();
            order.sort_by(|&a, &b| {
                x[a][feature]
                    .partial_cmp(&x[b][feature])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left_sum = 0.0;
            let mut left_sumsq = 0.0;
            let (total_sum, total_sumsq) = moments(y, indices);

            for pos in 0..order.len() - 1 {
                let i = order[pos];
                left_sum += y[i];
                left_sumsq += y[i] * y[i];

                let current = x[i][feature];
                let next = x[order[pos + 1]][feature];
                if next <= current {
                    // No boundary between equal values.
                    continue;
                }

                let n_left = (pos + 1) as f64;
                let n_right = n - n_left;
                let left_imp = impurity(self.kind, left_sum, left_sumsq, n_left);
                let right_imp = impurity(
                    self.kind,
                    total_sum - left_sum,
                    total_sumsq - left_sumsq,
                    n_right,
                );
                let weighted = (n_left * left_imp + n_right * right_imp) / n;
                let gain = node_impurity - weighted;

                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, (current + next) / 2.0, gain));
                }
            }
        }

        best
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

fn moments(y: &[f64], indices: &[usize]) -> (f64, f64) {
    let mut sum = 0.0;
    let mut sumsq = 0.0;
    for &i in indices {
        sum += y[i];
        sumsq += y[i] * y[i];
    }
    (sum, sumsq)
}

/// Impurity from the first two moments.
fn impurity(kind: TreeKind, sum: f64, sumsq: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    match kind {
        TreeKind::Gini => {
            let p = sum / n;
            (2.0 * p * (1.0 - p)).max(0.0)
        }
        TreeKind::Variance => {
            let mean = sum / n;
            (sumsq / n - mean * mean).max(0.0)
        }
    }
}
