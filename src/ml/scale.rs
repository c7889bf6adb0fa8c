//! Feature Standardization
//!
//! Zero-mean unit-variance scaling fitted on training rows and baked into
//! each serialized model that needs it (logistic/linear regression, kNN),
//! so serving-time inputs are scaled identically.

use serde::{Deserialize, Serialize};

/// Per-feature standardizer. Constant features scale to zero (std treated
/// as 1 to avoid division blow-ups).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl Scaler {
    /// Fit means/stds over training rows (population std).
    pub fn fit(x: &[Vec<f64>]) -> Self {
        let n = x.len().max(1) as f64;
        let d = x.first().map_or(0, Vec::len);

        let mut means = vec![0.0; d];
        for row in x {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut stds = vec![0.0; d];
        for row in x {
            for ((s, v), m) in stds.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2);
            }
        }
        for s in &mut stds {
            *s = (*s / n).sqrt();
            if *s == 0.0 {
                *s = 1.0;
            }
        }

        Self { means, stds }
    }

    /// Standardize one row.
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(&self.means)
            .zip(&self.stds)
            .map(|((v, m), s)| (v - m) / s)
            .collect()
    }

    /// Standardize many rows.
    pub fn transform_all(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter().map(|row| self.transform(row)).collect()
    }
}
