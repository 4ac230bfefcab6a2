//! Row/column statistics on voxel matrices
//!
//! NaN-aware column means and Pearson correlation across rows.

use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Column-wise mean ignoring NaN entries
///
/// A column with no non-NaN values (including the case of zero rows)
/// yields NaN.
pub fn nanmean_columns(data: ArrayView2<f64>) -> Array1<f64> {
    data.axis_iter(Axis(1))
        .map(|col| {
            let (sum, count) = col
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));
            if count == 0 {
                f64::NAN
            } else {
                sum / count as f64
            }
        })
        .collect()
}

/// Pearson correlation coefficients between the rows of `rows`
///
/// Returns an R x R matrix. Each entry is the centred cross-product of two
/// rows divided by the square roots of their sums of squares,
/// clipped to [-1, 1]. Rows with zero variance (or containing NaN) produce
/// NaN entries.
pub fn corrcoef(rows: ArrayView2<f64>) -> Array2<f64> {
    let (r, t) = rows.dim();

    let mut centered = rows.to_owned();
    for mut row in centered.rows_mut() {
        let mean = if t == 0 { f64::NAN } else { row.sum() / t as f64 };
        row.mapv_inplace(|v| v - mean);
    }

    // Root of each sum of squares taken separately; the product can leave f64 range
    let norms: Vec<f64> = centered.rows().into_iter().map(|row| row.dot(&row).sqrt()).collect();

    let mut out = Array2::<f64>::zeros((r, r));
    for i in 0..r {
        for j in i..r {
            let num = centered.row(i).dot(&centered.row(j));
            let c = (num / norms[i] / norms[j]).clamp(-1.0, 1.0);
            out[[i, j]] = c;
            out[[j, i]] = c;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_nanmean_ignores_nan() {
        let data = array![[1.0, f64::NAN], [3.0, 4.0], [f64::NAN, f64::NAN]];
        let mean = nanmean_columns(data.view());
        assert_eq!(mean.to_vec(), vec![2.0, 4.0]);
    }

    #[test]
    fn test_nanmean_empty_is_nan() {
        let data = Array2::<f64>::zeros((0, 3));
        let mean = nanmean_columns(data.view());
        assert_eq!(mean.len(), 3);
        assert!(mean.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_corrcoef_perfect_and_anti() {
        let rows = array![[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [3.0, 2.0, 1.0]];
        let c = corrcoef(rows.view());

        for i in 0..3 {
            assert!((c[[i, i]] - 1.0).abs() < 1e-12, "Diagonal {} = {}", i, c[[i, i]]);
        }
        assert!((c[[0, 1]] - 1.0).abs() < 1e-12);
        assert!((c[[0, 2]] + 1.0).abs() < 1e-12);
        assert_eq!(c[[1, 2]], c[[2, 1]]);
    }

    #[test]
    fn test_corrcoef_known_value() {
        // r = 0.8 for these two series
        let rows = array![[1.0, 2.0, 3.0, 4.0, 5.0], [2.0, 1.0, 4.0, 3.0, 5.0]];
        let c = corrcoef(rows.view());
        assert!((c[[0, 1]] - 0.8).abs() < 1e-12, "Expected 0.8, got {}", c[[0, 1]]);
    }

    #[test]
    fn test_corrcoef_scale_invariant() {
        for scale in [1e-90, 1e90] {
            let rows = array![[1.0, 2.0, 3.0, 4.0, 5.0], [2.0, 1.0, 4.0, 3.0, 5.0]] * scale;
            let c = corrcoef(rows.view());
            assert!((c[[0, 0]] - 1.0).abs() < 1e-12, "Diagonal at scale {} = {}", scale, c[[0, 0]]);
            assert!((c[[1, 1]] - 1.0).abs() < 1e-12, "Diagonal at scale {} = {}", scale, c[[1, 1]]);
            assert!((c[[0, 1]] - 0.8).abs() < 1e-12, "Expected 0.8 at scale {}, got {}", scale, c[[0, 1]]);
        }
    }

    #[test]
    fn test_corrcoef_zero_variance_is_nan() {
        let rows = array![[1.0, 1.0, 1.0], [1.0, 2.0, 3.0]];
        let c = corrcoef(rows.view());
        assert!(c[[0, 0]].is_nan());
        assert!(c[[0, 1]].is_nan());
        assert!((c[[1, 1]] - 1.0).abs() < 1e-12);
    }
}
