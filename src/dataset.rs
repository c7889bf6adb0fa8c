//! Maintenance Dataset Adapter
//!
//! Parses the AI4I predictive-maintenance CSV into a column-typed in-memory
//! frame used by the dataset-summary and distribution-plot tools. A column is
//! treated as numeric only when every non-empty cell parses as `f64`; anything
//! else stays textual (e.g. the `Type` machine class or `Failure Type`).
//!
//! The frame is loaded once at startup and shared read-only for the process
//! lifetime.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while reading or writing the dataset CSV.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("I/O error reading dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset file is empty (no header row)")]
    EmptyFile,
    #[error("row {row} has {got} fields, header has {expected}")]
    RaggedRow { row: usize, got: usize, expected: usize },
}

/// A single dataset column, typed at load time.
#[derive(Debug, Clone)]
pub enum Column {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

/// Descriptive statistics for one numeric column.
///
/// Field names mirror the summary layout the assistant reports
/// (count/mean/std/min/quartiles/max). Quantiles use linear interpolation,
/// std is the sample standard deviation.
#[derive(Debug, Clone, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    #[serde(rename = "25%")]
    pub q25: f64,
    #[serde(rename = "50%")]
    pub q50: f64,
    #[serde(rename = "75%")]
    pub q75: f64,
    pub max: f64,
}

/// Column-typed view over the analysis CSV.
#[derive(Debug, Clone)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    /// Load a CSV file into a typed frame.
    ///
    /// The header row defines column names. Every data row must have the
    /// same field count as the header.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header = match lines.next() {
            Some(line) => line?,
            None => return Err(DatasetError::EmptyFile),
        };
        let names: Vec<String> = split_csv_line(&header)
            .into_iter()
            .map(|s| s.trim().to_string())
            .collect();

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        let mut rows = 0usize;

        for (idx, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_csv_line(&line);
            if fields.len() != names.len() {
                return Err(DatasetError::RaggedRow {
                    row: idx + 2,
                    got: fields.len(),
                    expected: names.len(),
                });
            }
            for (col, field) in cells.iter_mut().zip(fields) {
                col.push(field);
            }
            rows += 1;
        }

        let columns = cells.into_iter().map(type_column).collect();

        Ok(Self { names, columns, rows })
    }

    /// Number of data rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column names in file order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Look up a column by exact name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(&self.columns[idx])
    }

    /// Whether the named column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Whether the named column is numeric.
    pub fn is_numeric(&self, name: &str) -> bool {
        matches!(self.column(name), Some(Column::Numeric(_)))
    }

    /// Numeric values of a column, or `None` for text columns.
    pub fn numeric_values(&self, name: &str) -> Option<&[f64]> {
        match self.column(name)? {
            Column::Numeric(values) => Some(values),
            Column::Text(_) => None,
        }
    }

    /// Per-row string labels for any column (numeric values are formatted
    /// without a trailing `.0`). Used by the categorical count plot.
    pub fn labels(&self, name: &str) -> Option<Vec<String>> {
        match self.column(name)? {
            Column::Text(values) => Some(values.clone()),
            Column::Numeric(values) => Some(values.iter().map(|v| format_value(*v)).collect()),
        }
    }

    /// Number of distinct values in a column.
    pub fn distinct_count(&self, name: &str) -> Option<usize> {
        match self.column(name)? {
            Column::Text(values) => {
                let mut seen: Vec<&str> = values.iter().map(String::as_str).collect();
                seen.sort_unstable();
                seen.dedup();
                Some(seen.len())
            }
            Column::Numeric(values) => {
                let mut seen: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
                seen.sort_unstable();
                seen.dedup();
                Some(seen.len())
            }
        }
    }

    /// Value counts for a column, most frequent first. Ties break by label
    /// so the ordering is deterministic.
    pub fn value_counts(&self, name: &str) -> Option<Vec<(String, usize)>> {
        let labels = self.labels(name)?;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for label in labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Some(pairs)
    }

    /// Descriptive statistics for one numeric column.
    pub fn numeric_summary(&self, name: &str) -> Option<NumericSummary> {
        let values = self.numeric_values(name)?;
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Some(NumericSummary {
            count,
            mean,
            std,
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            q50: quantile(&sorted, 0.50),
            q75: quantile(&sorted, 0.75),
            max: sorted[count - 1],
        })
    }

    /// Names of all numeric columns, in file order.
    pub fn numeric_names(&self) -> Vec<String> {
        self.names
            .iter()
            .zip(&self.columns)
            .filter(|(_, c)| matches!(c, Column::Numeric(_)))
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Return a copy with the named columns removed. Missing names are
    /// ignored (mirrors the lenient drop used when cleaning the raw CSV).
    pub fn drop_columns(&self, drop: &[&str]) -> Self {
        let mut names = Vec::new();
        let mut columns = Vec::new();
        for (name, column) in self.names.iter().zip(&self.columns) {
            if !drop.contains(&name.as_str()) {
                names.push(name.clone());
                columns.push(column.clone());
            }
        }
        Self { names, columns, rows: self.rows }
    }

    /// Write the frame back out as CSV (used for the cleaned serving copy).
    pub fn to_csv_path<P: AsRef<Path>>(&self, path: P) -> Result<(), DatasetError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", self.names.join(","))?;
        for row in 0..self.rows {
            let fields: Vec<String> = self
                .columns
                .iter()
                .map(|c| match c {
                    Column::Text(v) => v[row].clone(),
                    Column::Numeric(v) => format_value(v[row]),
                })
                .collect();
            writeln!(writer, "{}", fields.join(","))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Split one CSV line, honoring double-quoted fields.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Decide the column type from its raw cells.
fn type_column(cells: Vec<String>) -> Column {
    let all_numeric = !cells.is_empty()
        && cells
            .iter()
            .all(|c| c.trim().is_empty() || c.trim().parse::<f64>().is_ok());

    if all_numeric && cells.iter().any(|c| !c.trim().is_empty()) {
        Column::Numeric(
            cells
                .iter()
                .map(|c| c.trim().parse::<f64>().unwrap_or(f64::NAN))
                .collect(),
        )
    } else {
        Column::Text(cells.into_iter().map(|c| c.trim().to_string()).collect())
    }
}

/// Linear-interpolated quantile over an ascending-sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = pos - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Format a numeric cell without a trailing `.0` for whole numbers.
pub fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn sample_csv() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Type,Air temperature [K],Target").unwrap();
        for i in 0..10 {
            let ty = if i % 3 == 0 { "L" } else { "M" };
            let target = i32::from(i >= 8);
            writeln!(file, "{},{},{}", ty, 298.0 + i as f64, target).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_and_type_columns() {
        let file = sample_csv();
        let ds = Dataset::from_csv_path(file.path()).unwrap();

        assert_eq!(ds.rows(), 10);
        assert!(!ds.is_numeric("Type"));
        assert!(ds.is_numeric("Air temperature [K]"));
        assert!(ds.is_numeric("Target"));
        assert!(!ds.has_column("Torque [Nm]"));
    }

    #[test]
    fn test_value_counts_sorted_by_frequency() {
        let file = sample_csv();
        let ds = Dataset::from_csv_path(file.path()).unwrap();

        let counts = ds.value_counts("Type").unwrap();
        assert_eq!(counts[0], ("M".to_string(), 6));
        assert_eq!(counts[1], ("L".to_string(), 4));
    }

    #[test]
    fn test_numeric_summary_quartiles() {
        let file = sample_csv();
        let ds = Dataset::from_csv_path(file.path()).unwrap();

        let summary = ds.numeric_summary("Air temperature [K]").unwrap();
        assert_eq!(summary.count, 10);
        assert!((summary.min - 298.0).abs() < 1e-9);
        assert!((summary.max - 307.0).abs() < 1e-9);
        assert!((summary.q50 - 302.5).abs() < 1e-9);
        assert!((summary.mean - 302.5).abs() < 1e-9);
    }

    #[test]
    fn test_numeric_value_counts_format_integers() {
        let file = sample_csv();
        let ds = Dataset::from_csv_path(file.path()).unwrap();

        let counts = ds.value_counts("Target").unwrap();
        assert_eq!(counts[0], ("0".to_string(), 8));
        assert_eq!(counts[1], ("1".to_string(), 2));
    }

    #[test]
    fn test_drop_columns_and_roundtrip() {
        let file = sample_csv();
        let ds = Dataset::from_csv_path(file.path()).unwrap();

        let cleaned = ds.drop_columns(&["Target", "Not A Column"]);
        assert!(!cleaned.has_column("Target"));
        assert_eq!(cleaned.rows(), 10);

        let out = tempfile::NamedTempFile::new().unwrap();
        cleaned.to_csv_path(out.path()).unwrap();
        let reloaded = Dataset::from_csv_path(out.path()).unwrap();
        assert_eq!(reloaded.names(), cleaned.names());
        assert_eq!(reloaded.rows(), 10);
    }

    #[test]
    fn test_ragged_row_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a,b").unwrap();
        writeln!(file, "1,2,3").unwrap();
        file.flush().unwrap();

        let err = Dataset::from_csv_path(file.path()).unwrap_err();
        assert!(matches!(err, DatasetError::RaggedRow { .. }));
    }

    #[test]
    fn test_distinct_count() {
        let file = sample_csv();
        let ds = Dataset::from_csv_path(file.path()).unwrap();

        assert_eq!(ds.distinct_count("Type"), Some(2));
        assert_eq!(ds.distinct_count("Air temperature [K]"), Some(10));
    }
}
