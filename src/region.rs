//! Region-of-interest time series and correlation graphs
//!
//! A region is the set of voxels sharing a positive mask label. Each region
//! is summarised by its mean time series, and a graph is the matrix of
//! Pearson correlations between those series.

use std::path::Path;

use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView2};

use crate::error::{Error, Result};
use crate::masking::{mask_data, ThresholdRule, Thresholds};
use crate::utils::stats::{corrcoef, nanmean_columns};

/// Correlation graph between mask regions
#[derive(Clone, Debug)]
pub struct RegionGraph {
    /// Region labels, ascending; `labels[i]` owns row/column `i` of `matrix`
    pub labels: Vec<f64>,
    /// R x R Pearson correlation matrix
    pub matrix: Array2<f64>,
}

impl RegionGraph {
    pub fn n_regions(&self) -> usize {
        self.labels.len()
    }
}

/// Text layout options for written graphs
#[derive(Clone, Debug)]
pub struct GraphFormat {
    /// Field separator (default: single space)
    pub delimiter: u8,
    /// Digits after the decimal point in scientific notation (default 18)
    pub precision: usize,
}

impl Default for GraphFormat {
    fn default() -> Self {
        Self {
            delimiter: b' ',
            precision: 18,
        }
    }
}

/// Mean time series over all voxels carrying `label`
///
/// `label` may be a single value or a list of values (voxels matching any of
/// them are pooled). Constant-zero voxels are excluded. If no voxel is
/// selected the result is a series of NaN rather than an error.
pub fn mean_roi(data: ArrayView2<f64>, mask: ArrayView2<f64>, label: impl Into<Thresholds>) -> Result<Array1<f64>> {
    let labels = Thresholds::List(label.into().into_list());
    let masked = mask_data(data, mask, ThresholdRule::Equal, &labels)?;

    if masked.idx.is_empty() {
        warn!("no usable voxels for label(s) {:?}, mean is NaN", labels);
    }
    Ok(nanmean_columns(masked.data.view()))
}

/// Distinct labels strictly greater than zero, ascending
pub fn roi_labels(mask: ArrayView2<f64>) -> Vec<f64> {
    let mut labels: Vec<f64> = mask.iter().copied().filter(|&v| v > 0.0).collect();
    labels.sort_by(f64::total_cmp);
    labels.dedup();
    labels
}

/// Mean time series of every region, stacked as an R x T matrix
///
/// Row `i` belongs to `labels[i]` of the returned label list.
pub fn roi_timeseries(data: ArrayView2<f64>, mask: ArrayView2<f64>) -> Result<(Vec<f64>, Array2<f64>)> {
    let labels = roi_labels(mask);
    let mut ts = Array2::<f64>::zeros((labels.len(), data.ncols()));

    for (i, &label) in labels.iter().enumerate() {
        ts.row_mut(i).assign(&mean_roi(data, mask, label)?);
    }
    Ok((labels, ts))
}

/// Build the correlation graph between the mean time series of all regions
pub fn roi_graph(data: ArrayView2<f64>, mask: ArrayView2<f64>) -> Result<RegionGraph> {
    let (labels, ts) = roi_timeseries(data, mask)?;
    if labels.is_empty() {
        warn!("mask has no positive labels, graph is empty");
    }
    debug!("building {}x{} region graph", labels.len(), labels.len());

    Ok(RegionGraph {
        labels,
        matrix: corrcoef(ts.view()),
    })
}

/// Write a graph matrix as space-separated text, one row per line
pub fn write_graph(path: &Path, graph: &Array2<f64>) -> Result<()> {
    write_graph_with(path, graph, &GraphFormat::default())
}

/// Write a graph matrix using explicit layout options
pub fn write_graph_with(path: &Path, graph: &Array2<f64>, format: &GraphFormat) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(format.delimiter)
        .has_headers(false)
        .from_path(path)
        .map_err(|e| Error::csv(path, e))?;

    for row in graph.rows() {
        let fields: Vec<String> = row
            .iter()
            .map(|v| format!("{:.*e}", format.precision, v))
            .collect();
        writer.write_record(&fields).map_err(|e| Error::csv(path, e))?;
    }

    writer.flush().map_err(|e| Error::io(path, e))
}

/// Read a graph matrix written by [`write_graph_with`]
pub fn read_graph(path: &Path, format: &GraphFormat) -> Result<Array2<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::csv(path, e))?;

    let mut values = Vec::new();
    let mut n_cols = None;
    let mut n_rows = 0;

    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::csv(path, e))?;
        match n_cols {
            None => n_cols = Some(record.len()),
            Some(n) if n != record.len() => {
                return Err(Error::ShapeMismatch(format!(
                    "row {} of '{}' has {} values, expected {}",
                    line,
                    path.display(),
                    record.len(),
                    n
                )));
            }
            Some(_) => {}
        }
        for field in record.iter() {
            let v: f64 = field.parse().map_err(|_| {
                Error::InvalidArgument(format!("row {} of '{}': '{}' is not a number", line, path.display(), field))
            })?;
            values.push(v);
        }
        n_rows += 1;
    }

    Array2::from_shape_vec((n_rows, n_cols.unwrap_or(0)), values)
        .map_err(|e| Error::ShapeMismatch(format!("'{}': {}", path.display(), e)))
}
