//! NIfTI file I/O
//!
//! Loads 3D/4D NIfTI volumes (plain or gzip-compressed) into a flat
//! voxels x timepoints matrix, and writes such matrices back out as
//! float32 NIfTI-1 files on the original grid.
//!
//! Voxels are flattened in NIfTI (Fortran/column-major) order:
//! index = x + y*nx + z*nx*ny.

use std::io::{Cursor, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use log::debug;
use ndarray::{Array, Array2, ArrayView2, Axis, IxDyn};
use nifti::volume::ndarray::IntoNdArray;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject};

use crate::error::{Error, Result};
use crate::masking::VoxelIndexSet;

/// A volume loaded from disk, reshaped to (voxels, timepoints)
#[derive(Debug, Clone)]
pub struct Volume {
    /// Voxel data, one row per voxel, one column per timepoint
    pub data: Array2<f64>,
    /// Dimensions exactly as stored in the file (3 or 4 entries)
    pub dims: Vec<usize>,
    /// Voxel sizes in mm
    pub voxel_size: (f64, f64, f64),
    /// Affine transformation matrix (4x4, row-major)
    pub affine: [f64; 16],
    /// Raw header, passed through for writing equally-shaped outputs
    pub header: NiftiHeader,
}

impl Volume {
    /// Number of voxels (product of the spatial dimensions)
    pub fn n_voxels(&self) -> usize {
        self.data.nrows()
    }

    /// Number of timepoints (1 for 3D files)
    pub fn n_timepoints(&self) -> usize {
        self.data.ncols()
    }

    /// Spatial grid (nx, ny, nz)
    pub fn spatial_dims(&self) -> [usize; 3] {
        [self.dims[0], self.dims[1], self.dims[2]]
    }
}

/// Metadata of a 3D mask plus the flattened indices of its non-zero voxels
#[derive(Debug, Clone)]
pub struct MaskDims {
    pub idx: VoxelIndexSet,
    pub dims: Vec<usize>,
    pub voxel_size: (f64, f64, f64),
    pub affine: [f64; 16],
    pub header: NiftiHeader,
}

/// Check if bytes are gzip compressed
fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Get header info for diagnostics
fn get_header_info(bytes: &[u8]) -> String {
    if bytes.len() < 348 {
        return format!("file too small ({} bytes, need at least 348)", bytes.len());
    }

    let sizeof_hdr = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let magic = String::from_utf8_lossy(&bytes[344..348]).to_string();
    let ndim = i16::from_le_bytes([bytes[40], bytes[41]]);
    let datatype = i16::from_le_bytes([bytes[70], bytes[71]]);

    format!("sizeof_hdr={}, magic='{}', ndim={}, datatype={}", sizeof_hdr, magic, ndim, datatype)
}

fn read_object(bytes: &[u8]) -> Result<InMemNiftiObject> {
    if is_gzip(bytes) {
        InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes))).map_err(|e| {
            let mut decompressed = Vec::new();
            let info = match GzDecoder::new(Cursor::new(bytes)).read_to_end(&mut decompressed) {
                Ok(_) => get_header_info(&decompressed),
                Err(_) => "could not decompress".to_string(),
            };
            Error::Nifti(format!("failed to read gzipped NIfTI: {} ({})", e, info))
        })
    } else {
        let info = get_header_info(bytes);
        InMemNiftiObject::from_reader(Cursor::new(bytes))
            .map_err(|e| Error::Nifti(format!("failed to read NIfTI: {} ({})", e, info)))
    }
}

fn check_ndim(ndim: usize) -> Result<()> {
    if ndim < 3 {
        return Err(Error::Dimensionality(format!(
            "data has less than 3 dimensions ({}D)",
            ndim
        )));
    }
    if ndim > 4 {
        return Err(Error::Dimensionality(format!(
            "data has more than 4 dimensions ({}D)",
            ndim
        )));
    }
    Ok(())
}

/// Reject empty axes, which would leave a volume with no voxels or timepoints
fn check_extents(shape: &[usize]) -> Result<()> {
    if let Some(axis) = shape.iter().position(|&d| d == 0) {
        return Err(Error::Dimensionality(format!(
            "axis {} of shape {:?} is empty",
            axis, shape
        )));
    }
    Ok(())
}

/// Convert a dimension to the i16 stored in a NIfTI-1 header
fn header_dim(name: &str, value: usize) -> Result<i16> {
    i16::try_from(value).map_err(|_| {
        Error::Dimensionality(format!(
            "{} = {} does not fit a NIfTI-1 header (max {})",
            name,
            value,
            i16::MAX
        ))
    })
}

/// Index into 3D array (Fortran/column-major order)
#[inline(always)]
fn idx3d(i: usize, j: usize, k: usize, nx: usize, ny: usize) -> usize {
    i + j * nx + k * nx * ny
}

/// Load a NIfTI volume from bytes
///
/// Supports both .nii and .nii.gz (gzip is auto-detected). 3D volumes are
/// returned with a single timepoint column.
pub fn load_nifti(bytes: &[u8]) -> Result<Volume> {
    let obj = read_object(bytes)?;
    let header = obj.header().clone();
    let ndim = header.dim[0] as usize;
    check_ndim(ndim)?;
    let header_shape: Vec<usize> = header.dim[1..=ndim].iter().map(|&d| d as usize).collect();
    check_extents(&header_shape)?;

    let pixdim = header.pixdim;
    let voxel_size = (pixdim[1] as f64, pixdim[2] as f64, pixdim[3] as f64);
    let affine = get_affine(&header);

    let array: Array<f64, IxDyn> = obj
        .into_volume()
        .into_ndarray()
        .map_err(|e| Error::Nifti(format!("failed to convert to ndarray: {}", e)))?;

    // nifti-rs may reorder, so trust the array shape over the header
    let shape = array.shape().to_vec();
    check_ndim(shape.len())?;
    check_extents(&shape)?;

    let (nx, ny, nz) = (shape[0], shape[1], shape[2]);
    let nt = if shape.len() == 4 { shape[3] } else { 1 };
    debug!("loaded NIfTI volume with shape {:?} ({} voxels x {} timepoints)", shape, nx * ny * nz, nt);

    let mut data = Array2::<f64>::zeros((nx * ny * nz, nt));
    for t in 0..nt {
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let v = if shape.len() == 3 {
                        array[[i, j, k]]
                    } else {
                        array[[i, j, k, t]]
                    };
                    data[[idx3d(i, j, k, nx, ny), t]] = v;
                }
            }
        }
    }

    Ok(Volume {
        data,
        dims: shape,
        voxel_size,
        affine,
        header,
    })
}

/// Read a NIfTI volume from a filesystem path
///
/// Supports both .nii and .nii.gz files.
pub fn read_volume(path: &Path) -> Result<Volume> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    load_nifti(&bytes)
}

/// Load a 3D mask and locate its non-zero voxels
///
/// The returned metadata can be used to write per-voxel results, computed
/// on data from [`load_masked_data`], into an equally-shaped volume.
pub fn read_mask_dims(path: &Path) -> Result<MaskDims> {
    let mask = read_volume(path)?;
    if mask.dims.len() != 3 {
        return Err(Error::Dimensionality(format!(
            "mask '{}' should be 3D, got dims {:?}",
            path.display(),
            mask.dims
        )));
    }

    let idx = VoxelIndexSet::from_unsorted(
        mask.data
            .column(0)
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v > 0.0)
            .map(|(i, _)| i),
    );

    Ok(MaskDims {
        idx,
        dims: mask.dims,
        voxel_size: mask.voxel_size,
        affine: mask.affine,
        header: mask.header,
    })
}

/// Load the functional data at the non-zero voxels of a 3D mask
///
/// Returns a voxels x timepoints matrix, rows in ascending voxel order.
pub fn load_masked_data(func: &Path, mask: &Path) -> Result<Array2<f64>> {
    let volume = read_volume(func)?;
    let mask_dims = read_mask_dims(mask)?;

    let n_mask: usize = mask_dims.dims.iter().product();
    if n_mask != volume.n_voxels() {
        return Err(Error::ShapeMismatch(format!(
            "functional '{}' has {} voxels but mask '{}' has {}",
            func.display(),
            volume.n_voxels(),
            mask.display(),
            n_mask
        )));
    }

    Ok(volume.data.select(Axis(0), mask_dims.idx.as_slice()))
}

/// Scatter masked rows back onto the full voxel grid
///
/// Voxels not in `idx` are zero-filled.
pub fn unmask(values: ArrayView2<f64>, idx: &VoxelIndexSet, n_voxels: usize) -> Result<Array2<f64>> {
    if values.nrows() != idx.len() {
        return Err(Error::ShapeMismatch(format!(
            "{} rows of values for {} voxel indices",
            values.nrows(),
            idx.len()
        )));
    }
    if let Some(&last) = idx.as_slice().last() {
        if last >= n_voxels {
            return Err(Error::InvalidArgument(format!(
                "voxel index {} out of range for {} voxels",
                last, n_voxels
            )));
        }
    }

    let mut out = Array2::<f64>::zeros((n_voxels, values.ncols()));
    for (row, &i) in values.rows().into_iter().zip(idx.iter()) {
        out.row_mut(i).assign(&row);
    }
    Ok(out)
}

/// Get affine transformation matrix from header
fn get_affine(header: &NiftiHeader) -> [f64; 16] {
    // Prefer sform if available (sform_code > 0)
    if header.sform_code > 0 {
        let s = &header.srow_x;
        let t = &header.srow_y;
        let u = &header.srow_z;
        [
            s[0] as f64, s[1] as f64, s[2] as f64, s[3] as f64,
            t[0] as f64, t[1] as f64, t[2] as f64, t[3] as f64,
            u[0] as f64, u[1] as f64, u[2] as f64, u[3] as f64,
            0.0, 0.0, 0.0, 1.0,
        ]
    } else {
        // Fall back to identity with voxel scaling
        let vsx = header.pixdim[1] as f64;
        let vsy = header.pixdim[2] as f64;
        let vsz = header.pixdim[3] as f64;
        [
            vsx, 0.0, 0.0, 0.0,
            0.0, vsy, 0.0, 0.0,
            0.0, 0.0, vsz, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }
}

/// Save a voxels x timepoints matrix as NIfTI bytes
///
/// `dims` is the spatial grid (at least nx, ny, nz; a fourth entry is
/// ignored in favour of the column count). Writes an uncompressed .nii file,
/// 3D when there is a single column and 4D otherwise.
pub fn save_nifti(
    data: ArrayView2<f64>,
    dims: &[usize],
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
) -> Result<Vec<u8>> {
    if dims.len() < 3 {
        return Err(Error::Dimensionality(format!(
            "output grid needs 3 spatial dimensions, got {:?}",
            dims
        )));
    }
    let (nx, ny, nz) = (dims[0], dims[1], dims[2]);
    let nt = data.ncols();
    if data.nrows() != nx * ny * nz {
        return Err(Error::ShapeMismatch(format!(
            "{} rows of data for a {}x{}x{} grid",
            data.nrows(),
            nx,
            ny,
            nz
        )));
    }
    let (vsx, vsy, vsz) = voxel_size;

    // Create NIfTI-1 header (348 bytes)
    let mut header = [0u8; 348];

    // sizeof_hdr = 348
    header[0..4].copy_from_slice(&348i32.to_le_bytes());

    // dim[0..7]
    let ndim = if nt > 1 { 4 } else { 3 };
    if nt == 0 {
        return Err(Error::Dimensionality("data has no timepoints".to_string()));
    }
    let dim: [i16; 8] = [
        ndim,
        header_dim("nx", nx)?,
        header_dim("ny", ny)?,
        header_dim("nz", nz)?,
        header_dim("nt", nt)?,
        1, 1, 1,
    ];
    for (i, &d) in dim.iter().enumerate() {
        let offset = 40 + i * 2;
        header[offset..offset + 2].copy_from_slice(&d.to_le_bytes());
    }

    // datatype = 16 (FLOAT32), bitpix = 32
    header[70..72].copy_from_slice(&16i16.to_le_bytes());
    header[72..74].copy_from_slice(&32i16.to_le_bytes());

    // pixdim[0..7]
    let pixdim: [f32; 8] = [1.0, vsx as f32, vsy as f32, vsz as f32, 1.0, 1.0, 1.0, 1.0];
    for (i, &p) in pixdim.iter().enumerate() {
        let offset = 76 + i * 4;
        header[offset..offset + 4].copy_from_slice(&p.to_le_bytes());
    }

    // vox_offset = 352 (header + 4 bytes extension)
    header[108..112].copy_from_slice(&352.0f32.to_le_bytes());

    // scl_slope = 1.0, scl_inter = 0.0
    header[112..116].copy_from_slice(&1.0f32.to_le_bytes());
    header[116..120].copy_from_slice(&0.0f32.to_le_bytes());

    // sform_code = 1 (scanner anat)
    header[254..256].copy_from_slice(&1i16.to_le_bytes());

    // srow_x, srow_y, srow_z
    for row in 0..3 {
        for i in 0..4 {
            let offset = 280 + row * 16 + i * 4;
            header[offset..offset + 4].copy_from_slice(&(affine[row * 4 + i] as f32).to_le_bytes());
        }
    }

    // magic = "n+1\0" for NIfTI-1 single file
    header[344..348].copy_from_slice(b"n+1\0");

    let mut buffer = Vec::with_capacity(352 + data.len() * 4);
    buffer.extend_from_slice(&header);
    // No extension
    buffer.extend_from_slice(&[0u8; 4]);

    // Each volume in Fortran order, voxel index already x-fastest
    for t in 0..nt {
        for &val in data.column(t).iter() {
            buffer.extend_from_slice(&(val as f32).to_le_bytes());
        }
    }

    Ok(buffer)
}

/// Save a voxels x timepoints matrix as gzipped NIfTI bytes (.nii.gz)
pub fn save_nifti_gz(
    data: ArrayView2<f64>,
    dims: &[usize],
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
) -> Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let uncompressed = save_nifti(data, dims, voxel_size, affine)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&uncompressed)
        .map_err(|e| Error::Nifti(format!("gzip compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::Nifti(format!("gzip finish failed: {}", e)))
}

/// Save a voxels x timepoints matrix to a file
///
/// If the path ends with .nii.gz, the file is gzip compressed.
/// Otherwise it is saved as uncompressed .nii.
pub fn save_nifti_to_file(
    path: &Path,
    data: ArrayView2<f64>,
    dims: &[usize],
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
) -> Result<()> {
    let bytes = if path.to_string_lossy().ends_with(".nii.gz") {
        save_nifti_gz(data, dims, voxel_size, affine)?
    } else {
        save_nifti(data, dims, voxel_size, affine)?
    };

    std::fs::write(path, &bytes).map_err(|e| Error::io(path, e))
}
