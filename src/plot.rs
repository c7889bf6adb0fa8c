//! Plot Renderer
//!
//! Renders the assistant's chart tools to uniquely named PNGs under the
//! shared static directory: feature-importance bars for the XAI tool and
//! histogram/count distributions for the dataset tool.
//!
//! Rendering is serialized by a mutex — the draw/save sequence for one file
//! must not interleave with another request's. All plotters error types are
//! flattened to `PlotError` strings at this boundary; callers never see a
//! drawing backend type.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use plotters::prelude::*;
use statrs::distribution::{Continuous, Normal};
use thiserror::Error;
use uuid::Uuid;

use crate::dataset::Dataset;

/// Canvas size matching the 10x6-inch figures at ~96 dpi the UI expects.
const CANVAS: (u32, u32) = (960, 576);

/// Distinct-value cutoff: numeric columns above this render as histograms,
/// everything else as count bars.
const HISTOGRAM_DISTINCT_CUTOFF: usize = 20;

const HISTOGRAM_BINS: usize = 30;

/// Viridis-flavored fill palette.
const PALETTE: [RGBColor; 6] = [
    RGBColor(68, 1, 84),
    RGBColor(33, 145, 140),
    RGBColor(94, 201, 98),
    RGBColor(59, 82, 139),
    RGBColor(253, 190, 37),
    RGBColor(41, 120, 142),
];

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("nothing to plot: {0}")]
    Empty(String),
    #[error("drawing failed: {0}")]
    Draw(String),
}

/// Serialized PNG renderer over a shared static directory.
pub struct PlotRenderer {
    static_dir: PathBuf,
    render_lock: Mutex<()>,
}

impl PlotRenderer {
    /// Create the renderer, ensuring the static directory exists.
    pub fn new<P: AsRef<Path>>(static_dir: P) -> std::io::Result<Self> {
        std::fs::create_dir_all(&static_dir)?;
        Ok(Self {
            static_dir: static_dir.as_ref().to_path_buf(),
            render_lock: Mutex::new(()),
        })
    }

    /// Directory plots are written to.
    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    /// Render a sorted horizontal bar chart of feature importances.
    ///
    /// Returns the generated filename (not a full path or URL).
    pub fn feature_importance(
        &self,
        importances: &BTreeMap<String, f64>,
        title: &str,
    ) -> Result<String, PlotError> {
        if importances.is_empty() {
            return Err(PlotError::Empty("no feature importances".to_string()));
        }

        let mut sorted: Vec<(&String, f64)> =
            importances.iter().map(|(k, v)| (k, *v)).collect();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let filename = format!("plot_xai_{}.png", Uuid::new_v4());
        let path = self.static_dir.join(&filename);

        let guard = self
            .render_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let result = draw_importance_chart(&path, &sorted, title);
        drop(guard);

        match result {
            Ok(()) => Ok(filename),
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                Err(e)
            }
        }
    }

    /// Render a distribution chart for a dataset column, optionally broken
    /// down by a hue column. Numeric columns with more than 20 distinct
    /// values get a histogram with KDE overlays; everything else gets
    /// stacked count bars.
    pub fn distribution(
        &self,
        dataset: &Dataset,
        column: &str,
        hue: Option<&str>,
    ) -> Result<String, PlotError> {
        let filename = format!("plot_dist_{}.png", Uuid::new_v4());
        let path = self.static_dir.join(&filename);

        let guard = self
            .render_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let numeric = dataset.is_numeric(column)
            && dataset.distinct_count(column).unwrap_or(0) > HISTOGRAM_DISTINCT_CUTOFF;
        let result = if numeric {
            draw_histogram(&path, dataset, column, hue)
        } else {
            draw_count_bars(&path, dataset, column, hue)
        };
        drop(guard);

        match result {
            Ok(()) => Ok(filename),
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                Err(e)
            }
        }
    }
}

/// Flatten any plotters drawing error into a `PlotError`.
fn draw_err<E: std::fmt::Display>(e: E) -> PlotError {
    PlotError::Draw(e.to_string())
}

// ============================================================================
// Feature importance bars
// ============================================================================

fn draw_importance_chart(
    path: &Path,
    sorted: &[(&String, f64)],
    title: &str,
) -> Result<(), PlotError> {
    let root = BitMapBackend::new(path, CANVAS).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let n = sorted.len();
    let max_value = sorted
        .iter()
        .map(|(_, v)| *v)
        .fold(0.0f64, f64::max)
        .max(1e-9);

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Feature Importance - {title}"),
            ("sans-serif", 26),
        )
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(10)
        .build_cartesian_2d(0.0..max_value * 1.15, 0.0..n as f64)
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .disable_y_axis()
        .x_desc("Importance")
        .label_style(("sans-serif", 15))
        .draw()
        .map_err(draw_err)?;

    // Strongest feature at the top.
    chart
        .draw_series(sorted.iter().enumerate().map(|(i, (_, value))| {
            let y = (n - 1 - i) as f64;
            Rectangle::new(
                [(0.0, y + 0.15), (*value, y + 0.85)],
                PALETTE[i % PALETTE.len()].mix(0.9).filled(),
            )
        }))
        .map_err(draw_err)?;

    chart
        .draw_series(sorted.iter().enumerate().map(|(i, (name, _))| {
            let y = (n - 1 - i) as f64;
            Text::new(
                (*name).clone(),
                (max_value * 0.02, y + 0.35),
                ("sans-serif", 16).into_font().color(&BLACK),
            )
        }))
        .map_err(draw_err)?;

    root.present().map_err(draw_err)?;
    Ok(())
}

// ============================================================================
// Numeric histogram + KDE
// ============================================================================

fn draw_histogram(
    path: &Path,
    dataset: &Dataset,
    column: &str,
    hue: Option<&str>,
) -> Result<(), PlotError> {
    let values = dataset
        .numeric_values(column)
        .ok_or_else(|| PlotError::Empty(format!("column '{column}' is not numeric")))?;
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Err(PlotError::Empty(format!("column '{column}' has no values")));
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = (max - min).max(1e-9);
    let bin_width = span / HISTOGRAM_BINS as f64;

    // Group rows by hue label; a single anonymous group when no hue.
    let groups = group_values(dataset, column, hue)?;

    // Stacked bin counts, then the tallest stack sets the y range.
    let mut stacked: Vec<Vec<usize>> = Vec::with_capacity(groups.len());
    for (_, group_values) in &groups {
        stacked.push(bin_counts(group_values, min, bin_width));
    }
    let mut tallest = 0usize;
    for bin in 0..HISTOGRAM_BINS {
        let total: usize = stacked.iter().map(|counts| counts[bin]).sum();
        tallest = tallest.max(total);
    }

    let root = BitMapBackend::new(path, CANVAS).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Distribution of {column}"), ("sans-serif", 26))
        .margin(12)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(min..max, 0.0..(tallest.max(1) as f64) * 1.1)
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .x_desc(column.to_string())
        .y_desc("Count")
        .label_style(("sans-serif", 15))
        .draw()
        .map_err(draw_err)?;

    // Stacked bars, bottom-up per group.
    for bin in 0..HISTOGRAM_BINS {
        let x0 = min + bin as f64 * bin_width;
        let x1 = x0 + bin_width;
        let mut base = 0usize;
        for (gi, counts) in stacked.iter().enumerate() {
            let count = counts[bin];
            if count == 0 {
                continue;
            }
            let color = PALETTE[gi % PALETTE.len()].mix(0.8).filled();
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(x0, base as f64), (x1, (base + count) as f64)],
                    color,
                )))
                .map_err(draw_err)?;
            base += count;
        }
    }

    // One density curve per group, scaled back to counts.
    let kernel = Normal::new(0.0, 1.0).map_err(draw_err)?;
    for (gi, (label, group_values)) in groups.iter().enumerate() {
        if group_values.len() < 2 {
            continue;
        }
        let bandwidth = silverman_bandwidth(group_values);
        let scale = group_values.len() as f64 * bin_width;
        let color = PALETTE[gi % PALETTE.len()];
        let series = LineSeries::new(
            (0..=200).map(|i| {
                let x = min + span * i as f64 / 200.0;
                (x, kde(&kernel, group_values, x, bandwidth) * scale)
            }),
            color.stroke_width(2),
        );
        let drawn = chart.draw_series(series).map_err(draw_err)?;
        if groups.len() > 1 {
            drawn
                .label(label.clone())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }
    }

    if groups.len() > 1 {
        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.8))
            .draw()
            .map_err(draw_err)?;
    }

    root.present().map_err(draw_err)?;
    Ok(())
}

/// Per-bin counts over `[min, min + bins * width)`.
fn bin_counts(values: &[f64], min: f64, width: f64) -> Vec<usize> {
    let mut counts = vec![0usize; HISTOGRAM_BINS];
    for &v in values {
        if !v.is_finite() {
            continue;
        }
        let mut bin = ((v - min) / width) as usize;
        if bin >= HISTOGRAM_BINS {
            bin = HISTOGRAM_BINS - 1;
        }
        counts[bin] += 1;
    }
    counts
}

/// Silverman's rule-of-thumb bandwidth.
fn silverman_bandwidth(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    let bw = 1.06 * std * n.powf(-0.2);
    if bw > 0.0 {
        bw
    } else {
        1.0
    }
}

/// Gaussian kernel density estimate at `x`.
fn kde(kernel: &Normal, values: &[f64], x: f64, bandwidth: f64) -> f64 {
    let n = values.len() as f64;
    values
        .iter()
        .map(|v| kernel.pdf((x - v) / bandwidth))
        .sum::<f64>()
        / (n * bandwidth)
}

// ============================================================================
// Categorical count bars
// ============================================================================

fn draw_count_bars(
    path: &Path,
    dataset: &Dataset,
    column: &str,
    hue: Option<&str>,
) -> Result<(), PlotError> {
    let labels = dataset
        .labels(column)
        .ok_or_else(|| PlotError::Empty(format!("column '{column}' not found")))?;
    if labels.is_empty() {
        return Err(PlotError::Empty(format!("column '{column}' has no values")));
    }

    // Category order: most frequent first, like the summary tool reports.
    let counts = dataset
        .value_counts(column)
        .ok_or_else(|| PlotError::Empty(format!("column '{column}' not found")))?;
    let categories: Vec<String> = counts.iter().map(|(c, _)| c.clone()).collect();

    let hue_labels = match hue {
        Some(h) => Some(
            dataset
                .labels(h)
                .ok_or_else(|| PlotError::Empty(format!("column '{h}' not found")))?,
        ),
        None => None,
    };
    let hue_groups: Vec<String> = match (&hue_labels, hue) {
        (Some(hl), Some(h)) => dataset
            .value_counts(h)
            .map(|vc| vc.into_iter().map(|(c, _)| c).collect())
            .unwrap_or_else(|| hl.clone()),
        _ => vec![String::new()],
    };

    // stacks[cat][group] = count
    let mut stacks = vec![vec![0usize; hue_groups.len()]; categories.len()];
    for (row, label) in labels.iter().enumerate() {
        let Some(ci) = categories.iter().position(|c| c == label) else {
            continue;
        };
        let gi = match &hue_labels {
            Some(hl) => hue_groups.iter().position(|g| g == &hl[row]).unwrap_or(0),
            None => 0,
        };
        stacks[ci][gi] += 1;
    }

    let tallest = stacks
        .iter()
        .map(|groups| groups.iter().sum::<usize>())
        .max()
        .unwrap_or(1);

    let root = BitMapBackend::new(path, CANVAS).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let cats = categories.clone();
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Count of {column}"), ("sans-serif", 26))
        .margin(12)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(
            (0..categories.len()).into_segmented(),
            0.0..(tallest.max(1) as f64) * 1.1,
        )
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(column.to_string())
        .y_desc("Count")
        .label_style(("sans-serif", 15))
        .x_label_formatter(&move |seg| match seg {
            SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
                cats.get(*i).cloned().unwrap_or_default()
            }
            SegmentValue::Last => String::new(),
        })
        .draw()
        .map_err(draw_err)?;

    for (ci, groups) in stacks.iter().enumerate() {
        let mut base = 0usize;
        for (gi, &count) in groups.iter().enumerate() {
            if count == 0 {
                continue;
            }
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [
                        (SegmentValue::Exact(ci), base as f64),
                        (SegmentValue::Exact(ci + 1), (base + count) as f64),
                    ],
                    PALETTE[gi % PALETTE.len()].mix(0.85).filled(),
                )))
                .map_err(draw_err)?;
            base += count;
        }
    }

    root.present().map_err(draw_err)?;
    Ok(())
}

/// Split a numeric column into (hue label, values) groups; one unnamed group
/// when no hue is given.
fn group_values(
    dataset: &Dataset,
    column: &str,
    hue: Option<&str>,
) -> Result<Vec<(String, Vec<f64>)>, PlotError> {
    let values = dataset
        .numeric_values(column)
        .ok_or_else(|| PlotError::Empty(format!("column '{column}' is not numeric")))?;

    match hue {
        None => Ok(vec![(String::new(), values.to_vec())]),
        Some(h) => {
            let hue_labels = dataset
                .labels(h)
                .ok_or_else(|| PlotError::Empty(format!("column '{h}' not found")))?;
            let order: Vec<String> = dataset
                .value_counts(h)
                .map(|vc| vc.into_iter().map(|(c, _)| c).collect())
                .unwrap_or_default();

            let mut groups: Vec<(String, Vec<f64>)> =
                order.into_iter().map(|g| (g, Vec::new())).collect();
            for (row, &v) in values.iter().enumerate() {
                if let Some((_, bucket)) =
                    groups.iter_mut().find(|(g, _)| g == &hue_labels[row])
                {
                    bucket.push(v);
                }
            }
            groups.retain(|(_, v)| !v.is_empty());
            Ok(groups)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn sample_dataset() -> (tempfile::NamedTempFile, Dataset) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Type,Torque [Nm],Target").unwrap();
        for i in 0..60 {
            let ty = match i % 3 {
                0 => "L",
                1 => "M",
                _ => "H",
            };
            writeln!(
                file,
                "{},{:.2},{}",
                ty,
                20.0 + i as f64 * 0.7,
                u8::from(i % 10 == 0)
            )
            .unwrap();
        }
        file.flush().unwrap();
        let ds = Dataset::from_csv_path(file.path()).unwrap();
        (file, ds)
    }

    #[test]
    fn test_feature_importance_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PlotRenderer::new(dir.path()).unwrap();

        let mut importances = BTreeMap::new();
        importances.insert("Torque Nm".to_string(), 0.6);
        importances.insert("Type".to_string(), 0.4);

        let filename = renderer
            .feature_importance(&importances, "Failure Prediction (Classification)")
            .unwrap();
        assert!(filename.starts_with("plot_xai_"));
        assert!(filename.ends_with(".png"));
        assert!(dir.path().join(&filename).exists());
    }

    #[test]
    fn test_empty_importances_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PlotRenderer::new(dir.path()).unwrap();
        let err = renderer
            .feature_importance(&BTreeMap::new(), "x")
            .unwrap_err();
        assert!(matches!(err, PlotError::Empty(_)));
    }

    #[test]
    fn test_numeric_distribution_histogram() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PlotRenderer::new(dir.path()).unwrap();
        let (_file, ds) = sample_dataset();

        let filename = renderer.distribution(&ds, "Torque [Nm]", None).unwrap();
        assert!(filename.starts_with("plot_dist_"));
        assert!(dir.path().join(&filename).exists());
    }

    #[test]
    fn test_categorical_distribution_with_hue() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PlotRenderer::new(dir.path()).unwrap();
        let (_file, ds) = sample_dataset();

        let filename = renderer.distribution(&ds, "Type", Some("Target")).unwrap();
        assert!(dir.path().join(&filename).exists());
    }

    #[test]
    fn test_numeric_with_hue_groups() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PlotRenderer::new(dir.path()).unwrap();
        let (_file, ds) = sample_dataset();

        let filename = renderer
            .distribution(&ds, "Torque [Nm]", Some("Type"))
            .unwrap();
        assert!(dir.path().join(&filename).exists());
    }

    #[test]
    fn test_low_cardinality_numeric_uses_count_bars() {
        // Target has 2 distinct values — should take the categorical path
        // and still produce a file.
        let dir = tempfile::tempdir().unwrap();
        let renderer = PlotRenderer::new(dir.path()).unwrap();
        let (_file, ds) = sample_dataset();

        let filename = renderer.distribution(&ds, "Target", None).unwrap();
        assert!(dir.path().join(&filename).exists());
    }
}
