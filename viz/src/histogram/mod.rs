//! Fixed-bin histograms and bin-by-bin ratio curves
//!
//! Magnitude distributions in the QA figures all share one set of bin edges,
//! so counts from different samples can be compared bin by bin.

use crate::{Result, VizError};

/// Histogram over fixed, ascending bin edges
///
/// Bins are half-open `[lo, hi)` except the last one, which also includes its
/// upper edge. Values outside the edges and NaN are not counted.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Bin edges (boundaries between bins)
    bin_edges: Vec<f64>,
    /// Counts in each bin
    counts: Vec<u64>,
    /// Total number of values that landed in a bin
    total_count: u64,
}

impl Histogram {
    /// Create a new histogram with specified bin edges
    pub fn new(bin_edges: Vec<f64>) -> Result<Self> {
        if bin_edges.len() < 2 {
            return Err(VizError::HistogramError(
                "Histogram must have at least 2 bin edges".to_string(),
            ));
        }

        if bin_edges.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(VizError::HistogramError(
                "Histogram bin edges must be in ascending order".to_string(),
            ));
        }

        let num_bins = bin_edges.len() - 1;
        Ok(Self {
            bin_edges,
            counts: vec![0; num_bins],
            total_count: 0,
        })
    }

    /// Edges `start, start + step, ...` strictly below `stop`.
    ///
    /// `with_step(14.0, 27.0, 0.5)` gives 26 edges from 14.0 to 26.5.
    pub fn with_step(start: f64, stop: f64, step: f64) -> Result<Self> {
        if !(step > 0.0) || !start.is_finite() || !stop.is_finite() {
            return Err(VizError::HistogramError(format!(
                "Invalid bin range {start}..{stop} with step {step}"
            )));
        }

        let n = ((stop - start) / step).ceil().max(0.0) as usize;
        let edges = (0..n).map(|i| start + step * i as f64).collect();
        Self::new(edges)
    }

    /// Same edges, no counts.
    pub fn empty_like(&self) -> Self {
        Self {
            bin_edges: self.bin_edges.clone(),
            counts: vec![0; self.counts.len()],
            total_count: 0,
        }
    }

    /// Add a value to the histogram
    pub fn add(&mut self, value: f64) {
        if let Some(idx) = self.find_bin(value) {
            self.counts[idx] += 1;
            self.total_count += 1;
        }
    }

    /// Add multiple values to the histogram
    pub fn add_all<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = f64>,
    {
        for value in values {
            self.add(value);
        }
    }

    /// Fill a copy of this histogram's binning with `values`.
    pub fn fill(&self, values: &[f64]) -> Self {
        let mut hist = self.empty_like();
        hist.add_all(values.iter().copied());
        hist
    }

    /// Find the bin index for a value
    fn find_bin(&self, value: f64) -> Option<usize> {
        let first = self.bin_edges[0];
        let last = self.bin_edges[self.bin_edges.len() - 1];

        // NaN fails both comparisons
        if !(value >= first && value <= last) {
            return None;
        }

        // The last bin is closed on the right
        if value == last {
            return Some(self.counts.len() - 1);
        }

        Some(self.bin_edges.partition_point(|&edge| edge <= value) - 1)
    }

    /// Get the counts in each bin
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Get the bin edges
    pub fn bin_edges(&self) -> &[f64] {
        &self.bin_edges
    }

    /// Midpoint of every bin
    pub fn bin_centers(&self) -> Vec<f64> {
        self.bin_edges
            .windows(2)
            .map(|w| 0.5 * (w[0] + w[1]))
            .collect()
    }

    pub fn num_bins(&self) -> usize {
        self.counts.len()
    }

    /// Get the total count
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Largest single-bin count
    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Fraction `numerator / (numerator + other)` sampled at bin centers.
///
/// Only bins with a nonzero combined count are kept, so the ratio is always
/// defined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatioCurve {
    /// Bin centers of the retained bins
    pub x: Vec<f64>,
    /// Ratio in each retained bin
    pub y: Vec<f64>,
    /// Numerator count in each retained bin
    pub numerator: Vec<f64>,
    /// Combined count in each retained bin
    pub total: Vec<f64>,
}

impl RatioCurve {
    /// Build the ratio of two histograms sharing the same binning.
    pub fn from_histograms(numerator: &Histogram, other: &Histogram) -> Result<Self> {
        if numerator.bin_edges() != other.bin_edges() {
            return Err(VizError::HistogramError(
                "Ratio requires histograms with identical bin edges".to_string(),
            ));
        }
        Ok(Self::new(
            &numerator.bin_centers(),
            numerator.counts(),
            other.counts(),
        ))
    }

    /// Ratio from raw per-bin counts.
    pub fn new(centers: &[f64], numerator: &[u64], other: &[u64]) -> Self {
        let mut curve = Self::default();
        for ((&x, &n), &o) in centers.iter().zip(numerator).zip(other) {
            let total = n + o;
            if total == 0 {
                continue;
            }
            curve.x.push(x);
            curve.y.push(n as f64 / total as f64);
            curve.numerator.push(n as f64);
            curve.total.push(total as f64);
        }
        curve
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// `(x, y)` pairs for plotting
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.x.iter().copied().zip(self.y.iter().copied()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_creation() {
        let hist = Histogram::new(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(hist.num_bins(), 5);
        assert_eq!(hist.total_count(), 0);
    }

    #[test]
    fn test_histogram_rejects_bad_edges() {
        assert!(Histogram::new(vec![1.0]).is_err());
        assert!(Histogram::new(vec![0.0, 2.0, 1.0]).is_err());
        assert!(Histogram::new(vec![0.0, 1.0, 1.0]).is_err());
        assert!(Histogram::with_step(0.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_histogram_adding_values() {
        let mut hist = Histogram::new(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();

        hist.add(0.5);
        hist.add(1.5);
        hist.add(1.7);
        hist.add(5.0); // last edge belongs to the last bin
        hist.add(5.1); // outside
        hist.add(f64::NAN);

        assert_eq!(hist.counts(), &[1, 2, 0, 0, 1]);
        assert_eq!(hist.total_count(), 4);
        assert_eq!(hist.max_count(), 2);
    }

    #[test]
    fn test_with_step_matches_magnitude_binning() {
        let hist = Histogram::with_step(14.0, 27.0, 0.5).unwrap();
        assert_eq!(hist.bin_edges().len(), 26);
        assert_eq!(hist.bin_edges()[0], 14.0);
        assert_eq!(*hist.bin_edges().last().unwrap(), 26.5);
        assert_eq!(hist.bin_centers()[0], 14.25);
    }

    #[test]
    fn test_fill_shares_binning() {
        let base = Histogram::with_step(14.0, 27.0, 0.5).unwrap();
        let hist = base.fill(&[20.0, 20.0, 20.0, 21.0, 21.0]);
        assert_eq!(hist.bin_edges(), base.bin_edges());
        assert_eq!(hist.counts()[12], 3); // [20.0, 20.5)
        assert_eq!(hist.counts()[14], 2); // [21.0, 21.5)
        assert_eq!(base.total_count(), 0);
    }

    #[test]
    fn test_ratio_skips_empty_bins() {
        let centers = [1.0, 2.0, 3.0, 4.0];
        let curve = RatioCurve::new(&centers, &[3, 0, 2, 0], &[0, 0, 3, 2]);
        assert_eq!(curve.x, vec![1.0, 3.0, 4.0]);
        assert_eq!(curve.y, vec![1.0, 0.4, 0.0]);
        assert_eq!(curve.total, vec![3.0, 5.0, 2.0]);
        assert!(curve.y.iter().all(|y| y.is_finite()));
    }

    #[test]
    fn test_ratio_from_histograms_requires_same_edges() {
        let a = Histogram::with_step(0.0, 5.0, 1.0).unwrap();
        let b = Histogram::with_step(0.0, 5.0, 0.5).unwrap();
        assert!(RatioCurve::from_histograms(&a, &b).is_err());

        let matched = a.fill(&[0.5, 0.5, 1.5]);
        let unmatched = a.fill(&[1.5, 2.5]);
        let curve = RatioCurve::from_histograms(&matched, &unmatched).unwrap();
        assert_eq!(curve.points(), vec![(0.5, 1.0), (1.5, 0.5), (2.5, 0.0)]);
    }
}
