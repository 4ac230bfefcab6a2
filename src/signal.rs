//! Signal scaling utilities

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{Error, Result};

/// Scale each time series (row) by a factor
///
/// * no factors - each row is divided by its own mean
/// * one factor - every value is divided by it
/// * one factor per row - row `i` is divided by `factors[i]`
///
/// Dividing by the row mean (rather than subtracting it) is the established
/// behaviour downstream consumers rely on; it yields series centred on 1.
pub fn translate(data: ArrayView2<f64>, factors: &[f64]) -> Result<Array2<f64>> {
    match factors.len() {
        0 => {
            let means = data
                .mean_axis(Axis(1))
                .unwrap_or_else(|| Array1::from_elem(data.nrows(), f64::NAN));
            Ok(&data / &means.insert_axis(Axis(1)))
        }
        1 => Ok(&data / factors[0]),
        n if n == data.nrows() => {
            let factors = ArrayView1::from(factors).insert_axis(Axis(1));
            Ok(&data / &factors)
        }
        n => Err(Error::ShapeMismatch(format!(
            "{} factors submitted for {} time series",
            n,
            data.nrows()
        ))),
    }
}

/// Rescale a series to [0, 1]: subtract the minimum, then divide by the maximum
///
/// A constant series divides by zero and comes back as NaN. A NaN anywhere
/// in the input poisons both extremes, so the whole output is NaN.
pub fn scale_timeseries(ts: ArrayView1<f64>) -> Array1<f64> {
    let minimum = ts.iter().fold(f64::INFINITY, |a, &b| nan_min(a, b));
    let shifted = ts.mapv(|v| v - minimum);

    let maximum = shifted.iter().fold(f64::NEG_INFINITY, |a, &b| nan_max(a, b));
    shifted.mapv(|v| v / maximum)
}

#[inline]
fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) }
}

#[inline]
fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_translate_without_factors_divides_by_row_mean() {
        let data = array![[2.0, 4.0, 6.0], [1.0, 1.0, 4.0]];
        let out = translate(data.view(), &[]).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![0.5, 1.0, 1.5]);
        assert_eq!(out.row(1).to_vec(), vec![0.5, 0.5, 2.0]);
    }

    #[test]
    fn test_translate_single_factor() {
        let data = array![[2.0, 4.0], [8.0, 10.0]];
        let out = translate(data.view(), &[2.0]).unwrap();
        assert_eq!(out, array![[1.0, 2.0], [4.0, 5.0]]);
    }

    #[test]
    fn test_translate_per_row_factors() {
        let data = array![[2.0, 4.0], [9.0, 3.0], [5.0, 5.0]];
        let out = translate(data.view(), &[2.0, 3.0, 5.0]).unwrap();
        assert_eq!(out, array![[1.0, 2.0], [3.0, 1.0], [1.0, 1.0]]);
    }

    #[test]
    fn test_translate_wrong_factor_count() {
        let data = array![[2.0, 4.0], [9.0, 3.0], [5.0, 5.0]];
        assert!(matches!(translate(data.view(), &[1.0, 2.0]), Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_scale_timeseries_range() {
        let ts = array![3.0, 5.0, 4.0, 7.0];
        let scaled = scale_timeseries(ts.view());
        assert_eq!(scaled.to_vec(), vec![0.0, 0.5, 0.25, 1.0]);
    }

    #[test]
    fn test_scale_timeseries_idempotent() {
        let ts = array![-2.0, 0.5, 8.0, 3.0];
        let once = scale_timeseries(ts.view());
        let twice = scale_timeseries(once.view());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_scale_timeseries_nan_propagates() {
        let ts = array![1.0, f64::NAN, 3.0];
        assert!(scale_timeseries(ts.view()).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_scale_timeseries_constant_is_nan() {
        let ts = array![2.0, 2.0, 2.0];
        assert!(scale_timeseries(ts.view()).iter().all(|v| v.is_nan()));
    }
}
