//! Model Selection Metrics
//!
//! Hand-rolled scoring used by the training pipeline to pick the best
//! candidate per task: macro F1 for failure classification, RMSE for tool
//! wear regression. Accuracy and R² are computed alongside for logging.

/// Fraction of matching labels.
pub fn accuracy(truth: &[usize], pred: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth.iter().zip(pred).filter(|(t, p)| t == p).count();
    hits as f64 / truth.len() as f64
}

/// Macro-averaged F1 over the binary classes {0, 1}.
///
/// A class with no predicted and no actual members contributes an F1 of 0,
/// matching the selection behavior the pipeline was tuned against.
pub fn f1_macro(truth: &[usize], pred: &[usize]) -> f64 {
    (f1_for_class(truth, pred, 0) + f1_for_class(truth, pred, 1)) / 2.0
}

fn f1_for_class(truth: &[usize], pred: &[usize], class: usize) -> f64 {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (t, p) in truth.iter().zip(pred) {
        match (*t == class, *p == class) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    if tp == 0 {
        return 0.0;
    }
    let precision = tp as f64 / (tp + fp) as f64;
    let recall = tp as f64 / (tp + fn_) as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Root mean squared error.
pub fn rmse(truth: &[f64], pred: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let mse = truth
        .iter()
        .zip(pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / truth.len() as f64;
    mse.sqrt()
}

/// Coefficient of determination.
pub fn r2(truth: &[f64], pred: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let mean = truth.iter().sum::<f64>() / truth.len() as f64;
    let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = truth.iter().zip(pred).map(|(t, p)| (t - p).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    1.0 - ss_res / ss_tot
}
