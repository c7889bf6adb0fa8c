//! Linear Candidate Models
//!
//! Logistic regression (failure classification) and linear regression (tool
//! wear), both trained by full-batch gradient descent on standardized
//! features. Linear models are the interpretable baselines in the candidate
//! set; their absolute weights double as feature importances.

use serde::{Deserialize, Serialize};

use super::scale::Scaler;

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

// ============================================================================
// Logistic Regression
// ============================================================================

/// L2-free logistic regression over standardized features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegressionModel {
    scaler: Scaler,
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticRegressionModel {
    /// Fit by full-batch gradient descent.
    ///
    /// # Arguments
    /// * `x` - training rows
    /// * `y` - binary labels (0/1)
    /// * `epochs` - gradient steps (500 is plenty on standardized inputs)
    /// * `lr` - learning rate
    pub fn fit(x: &[Vec<f64>], y: &[usize], epochs: usize, lr: f64) -> Self {
        let scaler = Scaler::fit(x);
        let z = scaler.transform_all(x);
        let n = z.len().max(1) as f64;
        let d = z.first().map_or(0, Vec::len);

        let mut weights = vec![0.0; d];
        let mut bias = 0.0;

        for _ in 0..epochs {
            let mut grad_w = vec![0.0; d];
            let mut grad_b = 0.0;
            for (row, &label) in z.iter().zip(y) {
                let pred = sigmoid(dot(&weights, row) + bias);
                let err = pred - label as f64;
                for (g, v) in grad_w.iter_mut().zip(row) {
                    *g += err * v;
                }
                grad_b += err;
            }
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= lr * g / n;
            }
            bias -= lr * grad_b / n;
        }

        Self { scaler, weights, bias }
    }

    /// Probability of the positive (failure) class.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let z = self.scaler.transform(row);
        sigmoid(dot(&self.weights, &z) + self.bias)
    }

    /// Absolute standardized weights, normalized to sum 1.
    pub fn importances(&self) -> Vec<f64> {
        normalize_abs(&self.weights)
    }
}

// ============================================================================
// Linear Regression
// ============================================================================

/// Linear regression with a standardized target for stable gradient descent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegressionModel {
    scaler: Scaler,
    weights: Vec<f64>,
    bias: f64,
    y_mean: f64,
    y_std: f64,
}

impl LinearRegressionModel {
    /// Fit by full-batch gradient descent on standardized x and y.
    pub fn fit(x: &[Vec<f64>], y: &[f64], epochs: usize, lr: f64) -> Self {
        let scaler = Scaler::fit(x);
        let z = scaler.transform_all(x);
        let n = z.len().max(1) as f64;
        let d = z.first().map_or(0, Vec::len);

        let y_mean = y.iter().sum::<f64>() / n;
        let mut y_std = (y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n).sqrt();
        if y_std == 0.0 {
            y_std = 1.0;
        }
        let y_scaled: Vec<f64> = y.iter().map(|v| (v - y_mean) / y_std).collect();

        let mut weights = vec![0.0; d];
        let mut bias = 0.0;

        for _ in 0..epochs {
            let mut grad_w = vec![0.0; d];
            let mut grad_b = 0.0;
            for (row, &target) in z.iter().zip(&y_scaled) {
                let err = dot(&weights, row) + bias - target;
                for (g, v) in grad_w.iter_mut().zip(row) {
                    *g += err * v;
                }
                grad_b += err;
            }
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= lr * g / n;
            }
            bias -= lr * grad_b / n;
        }

        Self { scaler, weights, bias, y_mean, y_std }
    }

    /// Point estimate in original target units.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let z = self.scaler.transform(row);
        self.y_mean + self.y_std * (dot(&self.weights, &z) + self.bias)
    }

    /// Absolute standardized weights, normalized to sum 1.
    pub fn importances(&self) -> Vec<f64> {
        normalize_abs(&self.weights)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normalize_abs(weights: &[f64]) -> Vec<f64> {
    let abs: Vec<f64> = weights.iter().map(|w| w.abs()).collect();
    let total: f64 = abs.iter().sum();
    if total == 0.0 {
        abs
    } else {
        abs.iter().map(|v| v / total).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logistic_separates_linear_data() {
        // Positive iff first feature > 5.
        let x: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64 / 10.0, 1.0]).collect();
        let y: Vec<usize> = (0..100).map(|i| usize::from(i as f64 / 10.0 > 5.0)).collect();

        let model = LogisticRegressionModel::fit(&x, &y, 2000, 0.5);

        assert!(model.predict_proba(&[1.0, 1.0]) < 0.3);
        assert!(model.predict_proba(&[9.0, 1.0]) > 0.7);
    }

    #[test]
    fn test_logistic_proba_in_unit_interval() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let y = vec![0, 0, 1, 1];
        let model = LogisticRegressionModel::fit(&x, &y, 500, 0.1);

        for v in [-1000.0, -1.0, 0.5, 3.0, 1000.0] {
            let p = model.predict_proba(&[v]);
            assert!((0.0..=1.0).contains(&p), "p={p} out of range");
        }
    }

    #[test]
    fn test_linear_recovers_slope() {
        // y = 3x + 7
        let x: Vec<Vec<f64>> = (0..50).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..50).map(|i| 3.0 * i as f64 + 7.0).collect();

        let model = LinearRegressionModel::fit(&x, &y, 3000, 0.1);
        assert!((model.predict(&[10.0]) - 37.0).abs() < 1.0);
        assert!((model.predict(&[40.0]) - 127.0).abs() < 1.0);
    }

    #[test]
    fn test_importances_sum_to_one() {
        let x: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![i as f64, (i % 7) as f64, 0.5])
            .collect();
        let y: Vec<usize> = (0..60).map(|i| usize::from(i >= 30)).collect();
        let model = LogisticRegressionModel::fit(&x, &y, 500, 0.3);

        let imp = model.importances();
        assert_eq!(imp.len(), 3);
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
