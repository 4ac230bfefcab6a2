//! Common test utilities for qcmon-core integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use ndarray::Array2;

/// Reference Pearson correlation between two series
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    let mut sum_ab = 0.0;
    let mut sum_a2 = 0.0;
    let mut sum_b2 = 0.0;

    for i in 0..a.len() {
        sum_a += a[i];
        sum_b += b[i];
        sum_ab += a[i] * b[i];
        sum_a2 += a[i] * a[i];
        sum_b2 += b[i] * b[i];
    }

    let numerator = n * sum_ab - sum_a * sum_b;
    let denominator = ((n * sum_a2 - sum_a * sum_a) * (n * sum_b2 - sum_b * sum_b)).sqrt();
    numerator / denominator
}

/// Label mask on a grid: spheres of increasing label, background 0
///
/// Returns a voxels x 1 matrix in Fortran order (index = x + y*nx + z*nx*ny).
/// Later spheres overwrite earlier ones where they overlap.
pub fn sphere_labels(
    nx: usize, ny: usize, nz: usize,
    spheres: &[((f64, f64, f64), f64)],
) -> Array2<f64> {
    let mut mask = Array2::<f64>::zeros((nx * ny * nz, 1));

    for (label, &((cx, cy, cz), radius)) in spheres.iter().enumerate() {
        let r2 = radius * radius;
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let dx = i as f64 - cx;
                    let dy = j as f64 - cy;
                    let dz = k as f64 - cz;
                    if dx * dx + dy * dy + dz * dz <= r2 {
                        mask[[i + j * nx + k * nx * ny, 0]] = (label + 1) as f64;
                    }
                }
            }
        }
    }

    mask
}

/// Deterministic voxels x timepoints data
///
/// Voxels labelled in `mask` follow a per-label waveform plus a small
/// voxel-specific offset; every `zero_every`-th voxel is left all-zero.
pub fn synthetic_data(mask: &Array2<f64>, nt: usize, zero_every: usize) -> Array2<f64> {
    let n = mask.nrows();
    Array2::from_shape_fn((n, nt), |(v, t)| {
        if zero_every > 0 && v % zero_every == 0 {
            return 0.0;
        }
        let label = mask[[v, 0]];
        let phase = label * 0.7;
        10.0 + (t as f64 * 0.4 + phase).sin() * (1.0 + label) + (v as f64 * 0.013).cos() * 0.1
    })
}

pub const IDENTITY: [f64; 16] = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

/// Unique path under the system temp directory
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("qcmon_{}_{}", std::process::id(), name))
}
