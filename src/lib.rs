//! qcmon-core: voxel masking and ROI correlation graphs
//!
//! Helper routines for neuroimaging quality-control pipelines.
//!
//! # Modules
//! - `nifti_io`: Load 3D/4D NIfTI volumes as voxels x timepoints matrices, write results back
//! - `masking`: Threshold-rule voxel selection with constant-zero voxel removal
//! - `region`: Per-region mean time series and region correlation graphs
//! - `signal`: Time series scaling
//! - `subjects`: Subject discovery, name mangling and shell commands
//! - `utils`: NaN-aware means and Pearson correlation

pub mod error;

// Core modules
pub mod masking;
pub mod region;
pub mod signal;
pub mod utils;

// I/O modules
pub mod nifti_io;
pub mod subjects;

pub use error::{Error, Result};
pub use masking::{mask_data, MaskedData, ThresholdRule, Thresholds, VoxelIndexSet};
pub use nifti_io::{read_volume, Volume};
pub use region::{mean_roi, roi_graph, write_graph, RegionGraph};
pub use signal::{scale_timeseries, translate};
