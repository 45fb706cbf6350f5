//! Shared descriptive statistics
//!
//! Small numeric helpers used by the AGP, rate-of-change and summary code.
//! All functions accept empty input and return 0.0 rather than NaN.

/// Linear-interpolation percentile of an ascending-sorted slice.
///
/// `p` is a fraction in [0, 1]. The index is `(n - 1) * p`; the result
/// interpolates between the values at the floor and ceiling of that index.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    let index = (sorted.len() - 1) as f64 * p;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = index - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Arithmetic mean
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Centered moving average with an odd `window`.
///
/// Near the edges the window shrinks to the neighbours that exist, so the
/// output has the same length as the input.
pub fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let half = window.max(1) / 2;
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(values.len());
            mean(&values[start..end])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [5.0, 7.0];
        assert!((percentile_sorted(&sorted, 0.5) - 6.0).abs() < 1e-12);
        assert!((percentile_sorted(&sorted, 0.1) - 5.2).abs() < 1e-12);

        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&sorted, 0.25), 2.0);
        assert_eq!(percentile_sorted(&sorted, 0.0), 1.0);
        assert_eq!(percentile_sorted(&sorted, 1.0), 5.0);
    }

    #[test]
    fn test_percentile_single_and_empty() {
        assert_eq!(percentile_sorted(&[4.2], 0.9), 4.2);
        assert_eq!(percentile_sorted(&[], 0.5), 0.0);
    }

    #[test]
    fn test_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-12);
        assert!((population_std_dev(&values) - 2.0).abs() < 1e-12);
        assert_eq!(population_std_dev(&[]), 0.0);
    }

    #[test]
    fn test_moving_average_edges() {
        let smoothed = centered_moving_average(&[0.0, 3.0, 6.0, 3.0], 3);
        assert_eq!(smoothed, vec![1.5, 3.0, 4.0, 4.5]);
        assert!(centered_moving_average(&[], 3).is_empty());
    }
}
