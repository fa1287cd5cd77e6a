use ordered_float::OrderedFloat;

/// Sorts finite values ascending, dropping NaN and infinities.
pub fn sorted_finite(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    sorted.sort_unstable_by_key(|v| OrderedFloat(*v));
    sorted
}

/// Linearly interpolated percentile (`0..=100`) of an ascending slice.
///
/// Matches the "linear" method used by numpy and polars. Returns `None` for an empty slice.
pub fn percentile_of_sorted(sorted: &[f64], percentile: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let rank = (percentile.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

pub fn percentile(values: impl IntoIterator<Item = f64>, percentile: f64) -> Option<f64> {
    percentile_of_sorted(&sorted_finite(values), percentile)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(values, 0.0), Some(1.0));
        assert_eq!(percentile(values, 100.0), Some(4.0));
        assert_eq!(percentile(values, 50.0), Some(2.5));
        // rank = 0.05 * 3 = 0.15
        let p5 = percentile(values, 5.0).unwrap();
        assert!((p5 - 1.15).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_skips_non_finite() {
        assert_eq!(percentile([f64::NAN, 2.0, f64::INFINITY], 50.0), Some(2.0));
        assert_eq!(percentile([f64::NAN], 50.0), None);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
    }
}
