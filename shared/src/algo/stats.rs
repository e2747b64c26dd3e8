//! Robust summary statistics over per-sensor samples

/// Calculate median of a slice of f64 values
///
/// NaN values are ignored; infinite values take part in the ordering. For
/// even-length data the average of the two middle values is returned.
///
/// # Arguments
///
/// * `values` - Slice of f64 values, typically one sensor's measurements
///
/// # Returns
///
/// * `Some(median)` - The median of the non-NaN values
/// * `None` - If the slice is empty or every value is NaN
///
/// # Examples
///
/// ```rust
/// use shared::algo::median;
///
/// assert_eq!(median(&[0.1, 0.2, 0.3]), Some(0.2));
/// assert_eq!(median(&[]), None);
/// ```
pub fn median(values: &[f64]) -> Option<f64> {
    let mut valid_values: Vec<f64> = values.iter().filter(|v| !v.is_nan()).copied().collect();

    if valid_values.is_empty() {
        return None;
    }

    valid_values.sort_by(|a, b| a.total_cmp(b));

    let mid = valid_values.len() / 2;
    let median_value = if valid_values.len() % 2 == 0 {
        (valid_values[mid - 1] + valid_values[mid]) / 2.0
    } else {
        valid_values[mid]
    };

    Some(median_value)
}

/// Sample count together with the median, as reported alongside QA tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MedianSummary {
    /// Number of non-NaN values that entered the median
    pub n: usize,
    pub median: Option<f64>,
}

/// Median plus the number of points it was computed from.
///
/// # Arguments
///
/// * `values` - Slice of f64 values; NaN entries are neither counted nor used
///
/// # Returns
///
/// A [`MedianSummary`] whose `median` is `None` when `n` is zero.
pub fn median_summary(values: &[f64]) -> MedianSummary {
    MedianSummary {
        n: values.iter().filter(|v| !v.is_nan()).count(),
        median: median(values),
    }
}

/// Pogson magnitude of a flux, `-2.5 log10(flux)`.
///
/// Non-positive fluxes give a non-finite result; callers filter with
/// `is_finite()`.
///
/// # Examples
///
/// ```rust
/// use shared::algo::flux_to_mag;
///
/// assert!((flux_to_mag(100.0) + 5.0).abs() < 1e-12);
/// assert!(!flux_to_mag(0.0).is_finite());
/// ```
pub fn flux_to_mag(flux: f64) -> f64 {
    -2.5 * flux.log10()
}
