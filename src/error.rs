//! Crate-wide error type

use std::path::PathBuf;

/// Errors raised by loading, masking and graph operations.
///
/// Degenerate numeric cases (empty selections, zero variance) are not errors;
/// they surface as NaN values in the results.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Data and mask (or data and factors) disagree on the voxel count
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Mask carries more than one value per voxel
    #[error("invalid mask: {0}")]
    InvalidMask(String),

    /// Unknown rule token, scalar where a list is required, and similar
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Volume is not 3D/4D, or a mask is not 3D
    #[error("unsupported dimensionality: {0}")]
    Dimensionality(String),

    #[error("failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Delimited text read/write failure
    #[error("failed to process '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// NIfTI decode/encode failure
    #[error("nifti: {0}")]
    Nifti(String),

    #[error("command `{cmd}` failed with return code {code:?}\nSTDOUT: {stdout}\nSTDERR: {stderr}")]
    CommandFailed {
        cmd: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Error::Csv { path: path.into(), source }
    }
}
