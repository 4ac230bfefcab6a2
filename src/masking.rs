//! Threshold-based voxel selection
//!
//! Selects rows of a voxels x timepoints matrix by comparing a parallel
//! one-column mask against one or more thresholds. Voxels whose time series
//! sums to zero are always dropped from the selection.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{Error, Result};

/// Comparison applied between each mask value and a threshold
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThresholdRule {
    /// Keep voxels equal to the threshold (`=`)
    Equal,
    /// Keep voxels greater than the threshold (`>`)
    Greater,
    /// Keep voxels less than the threshold (`<`)
    Less,
}

impl ThresholdRule {
    #[inline]
    fn matches(self, value: f64, threshold: f64) -> bool {
        match self {
            ThresholdRule::Equal => value == threshold,
            ThresholdRule::Greater => value > threshold,
            ThresholdRule::Less => value < threshold,
        }
    }
}

impl FromStr for ThresholdRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(ThresholdRule::Equal),
            ">" => Ok(ThresholdRule::Greater),
            "<" => Ok(ThresholdRule::Less),
            other => Err(Error::InvalidArgument(format!(
                "threshold rule must be '=', '>', or '<', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdRule::Equal => write!(f, "="),
            ThresholdRule::Greater => write!(f, ">"),
            ThresholdRule::Less => write!(f, "<"),
        }
    }
}

/// A threshold argument that may be a single value or a list of values
///
/// [`mask_data`] only accepts lists; callers holding a single label wrap it
/// with [`Thresholds::into_list`].
#[derive(Clone, Debug, PartialEq)]
pub enum Thresholds {
    Scalar(f64),
    List(Vec<f64>),
}

impl Thresholds {
    /// Normalise to a list, wrapping a scalar into a single-element list
    pub fn into_list(self) -> Vec<f64> {
        match self {
            Thresholds::Scalar(v) => vec![v],
            Thresholds::List(vs) => vs,
        }
    }
}

impl From<f64> for Thresholds {
    fn from(v: f64) -> Self {
        Thresholds::Scalar(v)
    }
}

impl From<Vec<f64>> for Thresholds {
    fn from(vs: Vec<f64>) -> Self {
        Thresholds::List(vs)
    }
}

impl From<&[f64]> for Thresholds {
    fn from(vs: &[f64]) -> Self {
        Thresholds::List(vs.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Thresholds {
    fn from(vs: [f64; N]) -> Self {
        Thresholds::List(vs.to_vec())
    }
}

/// Ascending, deduplicated voxel indices into the original voxel dimension
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoxelIndexSet(Vec<usize>);

impl VoxelIndexSet {
    /// Build from indices in any order, possibly with duplicates
    pub fn from_unsorted<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        let set: BTreeSet<usize> = indices.into_iter().collect();
        VoxelIndexSet(set.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.0.iter()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    /// Indices in `self` that are not in `other`
    pub fn difference(&self, other: &VoxelIndexSet) -> VoxelIndexSet {
        VoxelIndexSet(self.0.iter().copied().filter(|&i| !other.contains(i)).collect())
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.0
    }
}

impl<'a> IntoIterator for &'a VoxelIndexSet {
    type Item = &'a usize;
    type IntoIter = std::slice::Iter<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Rows of the data selected by [`mask_data`], with their original positions
#[derive(Clone, Debug)]
pub struct MaskedData {
    /// Selected rows, in ascending voxel order
    pub data: Array2<f64>,
    /// Original-space position of each selected row
    pub idx: VoxelIndexSet,
}

/// Ensure data and mask are on the same grid
pub fn check_dims(data: ArrayView2<f64>, mask: ArrayView2<f64>) -> Result<()> {
    if data.nrows() != mask.nrows() {
        return Err(Error::ShapeMismatch(format!(
            "data {:?} and mask {:?} are not in the same space",
            data.shape(),
            mask.shape()
        )));
    }
    Ok(())
}

/// Ensure the mask holds a single value per voxel
pub fn check_mask(mask: ArrayView2<f64>) -> Result<()> {
    if mask.ncols() != 1 {
        return Err(Error::InvalidMask(format!(
            "mask contains {} values per voxel, expected 1",
            mask.ncols()
        )));
    }
    Ok(())
}

/// Voxels whose time series sums to exactly zero
pub fn constant_zero_voxels(data: ArrayView2<f64>) -> VoxelIndexSet {
    VoxelIndexSet(
        data.sum_axis(Axis(1))
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s == 0.0)
            .map(|(i, _)| i)
            .collect(),
    )
}

/// Extract voxels of interest using a threshold rule applied to the mask
///
/// The selection is the union over all thresholds of voxels where
/// `mask <rule> threshold`. Voxels with constant-zero time series are
/// removed regardless of the mask, and the number removed is logged.
///
/// # Arguments
/// * `data` - Voxels x timepoints matrix
/// * `mask` - Voxels x 1 label/value matrix on the same grid
/// * `rule` - Comparison between mask values and thresholds
/// * `thresholds` - Must be a non-empty [`Thresholds::List`]
///
/// # Returns
/// The selected rows and their indices relative to the original array
pub fn mask_data(
    data: ArrayView2<f64>,
    mask: ArrayView2<f64>,
    rule: ThresholdRule,
    thresholds: &Thresholds,
) -> Result<MaskedData> {
    check_dims(data, mask)?;
    check_mask(mask)?;

    let thresholds = match thresholds {
        Thresholds::List(vs) if vs.is_empty() => {
            return Err(Error::InvalidArgument("threshold list is empty".to_string()));
        }
        Thresholds::List(vs) => vs,
        Thresholds::Scalar(v) => {
            return Err(Error::InvalidArgument(format!(
                "thresholds must be given as a list, got scalar {}",
                v
            )));
        }
    };

    let values = mask.column(0);
    let selected = VoxelIndexSet::from_unsorted(thresholds.iter().flat_map(|&t| {
        values
            .iter()
            .enumerate()
            .filter(move |&(_, &m)| rule.matches(m, t))
            .map(|(i, _)| i)
    }));

    let zeros = constant_zero_voxels(data);
    let idx = selected.difference(&zeros);

    let dropped = selected.len() - idx.len();
    if dropped > 0 {
        info!(
            "removed {} constant-zero voxel(s) from the selection ({} in the whole volume)",
            dropped,
            zeros.len()
        );
    }
    debug!(
        "mask rule '{}' over {:?} selected {} of {} voxels",
        rule,
        thresholds,
        idx.len(),
        mask.nrows()
    );

    Ok(MaskedData {
        data: data.select(Axis(0), idx.as_slice()),
        idx,
    })
}
