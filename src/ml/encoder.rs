//! Categorical Label Encoder
//!
//! Maps category strings to stable integer codes. Fitted once by the
//! training binary on the `Type` column and serialized alongside the models
//! so serving encodes inputs exactly as training did.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when `transform` sees a category absent from the fitted classes.
#[derive(Debug, Error)]
#[error("unknown category '{category}' (known: {known})")]
pub struct UnknownCategory {
    pub category: String,
    pub known: String,
}

/// Sorted-class label encoder, matching the fit/transform contract used at
/// training time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on raw values: classes are the sorted distinct values, codes are
    /// their positions.
    pub fn fit(values: &[String]) -> Self {
        let mut classes: Vec<String> = values.to_vec();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Encode one category, failing descriptively on unseen values.
    pub fn transform(&self, value: &str) -> Result<usize, UnknownCategory> {
        self.classes
            .iter()
            .position(|c| c == value)
            .ok_or_else(|| UnknownCategory {
                category: value.to_string(),
                known: self.classes.join(", "),
            })
    }

    /// The fitted classes in code order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}
