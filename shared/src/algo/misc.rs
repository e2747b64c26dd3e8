//! Interpolation helpers for sampled curves.
//!
//! Completeness and similar fraction curves are sampled at bin centers; these
//! helpers locate where such a curve crosses a given level.

use thiserror::Error;

/// Errors that can occur during interpolation operations.
#[derive(Error, Debug, PartialEq)]
pub enum InterpError {
    #[error("Value {0} is out of bounds for interpolation range [{1}, {2}]")]
    OutOfBounds(f64, f64, f64),
    #[error("Input vectors must have the same length")]
    MismatchedLengths,
    #[error("X values must be sorted in ascending order")]
    UnsortedData,
}

fn validate(xs: &[f64], ys: &[f64]) -> Result<(), InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::MismatchedLengths);
    }
    if xs.windows(2).any(|w| w[1] < w[0]) {
        return Err(InterpError::UnsortedData);
    }
    Ok(())
}

/// Linear interpolation of `ys(xs)` at `x`.
///
/// The interval is located by binary search, then
/// `y = y1 + (x - x1) / (x2 - x1) * (y2 - y1)`.
///
/// # Arguments
///
/// * `x` - Position to interpolate at
/// * `xs` - Sample positions, sorted ascending
/// * `ys` - Sample values, same length as `xs`
///
/// # Returns
///
/// * `Ok(y)` - The interpolated value; end points are returned as-is
/// * `Err(InterpError)` - `OutOfBounds` when `x` lies outside `xs` (or `xs`
///   is empty), `MismatchedLengths` or `UnsortedData` for bad input
pub fn interp(x: f64, xs: &[f64], ys: &[f64]) -> Result<f64, InterpError> {
    validate(xs, ys)?;
    let (Some(&first), Some(&last)) = (xs.first(), xs.last()) else {
        return Err(InterpError::OutOfBounds(x, f64::NAN, f64::NAN));
    };
    if x < first || x > last {
        return Err(InterpError::OutOfBounds(x, first, last));
    }

    // partition_point returns the index of the first element > x
    let idx = xs.partition_point(|&val| val <= x);
    if idx == 0 {
        return Ok(ys[0]);
    }
    if idx == xs.len() {
        return Ok(ys[xs.len() - 1]);
    }

    let (x1, x2) = (xs[idx - 1], xs[idx]);
    let (y1, y2) = (ys[idx - 1], ys[idx]);
    let t = (x - x1) / (x2 - x1);
    Ok(y1 + t * (y2 - y1))
}

/// Find where a sampled curve falls through `level`, searching from the end.
///
/// Walks adjacent sample pairs from the last (largest x) towards the first and
/// returns the linearly interpolated x of the first pair found with
/// `ys[i-1] > level` and `ys[i] <= level`:
///
/// ```text
/// x = x[i-1] + (level - y[i-1]) / (y[i] - y[i-1]) * (x[i] - x[i-1])
/// ```
///
/// Returns `Ok(None)` when the curve never falls through the level.
///
/// # Examples
///
/// ```rust
/// use shared::algo::misc::falling_crossing;
///
/// let xs = [20.25, 21.25, 22.25];
/// let ys = [1.0, 0.4, 0.0];
/// let x = falling_crossing(0.5, &xs, &ys).unwrap().unwrap();
/// assert!((x - (20.25 + 0.5 / 0.6)).abs() < 1e-12);
/// ```
pub fn falling_crossing(level: f64, xs: &[f64], ys: &[f64]) -> Result<Option<f64>, InterpError> {
    validate(xs, ys)?;

    for i in (1..ys.len()).rev() {
        if ys[i] <= level && ys[i - 1] > level {
            let x = (level - ys[i - 1]) / (ys[i] - ys[i - 1]) * (xs[i] - xs[i - 1]) + xs[i - 1];
            return Ok(Some(x));
        }
    }
    Ok(None)
}
