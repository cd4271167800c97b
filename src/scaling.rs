use ndarray::Array2;

/// Color-scale bounds. `None` means the rendering falls back to auto-scaling.
pub type ColorBounds = (Option<f64>, Option<f64>);

/// Percentile of a sorted slice with linear interpolation between
/// order statistics. `q` is in [0, 100].
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Derive the color-scale bounds from the score distribution.
///
/// Absent overrides are replaced by the 1st / 98th percentile of the finite
/// matrix values, which keeps outliers from dominating the color range. When
/// the matrix holds no finite value at all, the bound stays absent and the
/// rendering auto-scales.
pub fn derive_bounds(
    values: &Array2<f64>,
    z_min: Option<f64>,
    z_max: Option<f64>,
) -> ColorBounds {
    if z_min.is_some() && z_max.is_some() {
        return (z_min, z_max);
    }

    // flatten once, shared between both bounds
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    finite.sort_by(|a, b| a.total_cmp(b));

    let lower = z_min.or_else(|| {
        let p = percentile_sorted(&finite, 1.0);
        if p.is_nan() {
            None
        } else {
            Some(p)
        }
    });
    let upper = z_max.or_else(|| {
        let p = percentile_sorted(&finite, 98.0);
        if p.is_nan() {
            None
        } else {
            Some(p)
        }
    });
    (lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn percentile_interpolates() {
        let data = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        assert!((percentile_sorted(&data, 0.0) - 0.0).abs() < 1e-9);
        assert!((percentile_sorted(&data, 50.0) - 2.0).abs() < 1e-9);
        assert!((percentile_sorted(&data, 100.0) - 4.0).abs() < 1e-9);
        assert!((percentile_sorted(&data, 25.0) - 1.0).abs() < 1e-9);
        assert!((percentile_sorted(&data, 12.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn derive_bounds_is_deterministic() {
        let m = arr2(&[[1.0, 2.0, f64::NAN], [4.0, 100.0, -5.0]]);
        let a = derive_bounds(&m, None, None);
        let b = derive_bounds(&m, None, None);
        assert_eq!(a, b);
        assert!(a.0.is_some() && a.1.is_some());
    }

    #[test]
    fn overrides_pass_through() {
        let m = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let (lo, hi) = derive_bounds(&m, Some(-1.0), Some(9.0));
        assert_eq!(lo, Some(-1.0));
        assert_eq!(hi, Some(9.0));
    }

    #[test]
    fn all_missing_yields_auto_scale() {
        let m = arr2(&[[f64::NAN, f64::NAN], [f64::NAN, f64::NAN]]);
        assert_eq!(derive_bounds(&m, None, None), (None, None));
    }

    #[test]
    fn partial_override_derives_the_other_bound() {
        let m = arr2(&[[0.0, 1.0], [2.0, 3.0]]);
        let (lo, hi) = derive_bounds(&m, Some(0.5), None);
        assert_eq!(lo, Some(0.5));
        assert!(hi.unwrap() > 2.0);
    }
}
