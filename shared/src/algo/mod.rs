//! Numeric helpers used by the QA analyses
//!
//! Median statistics and sampled-curve interpolation.

pub mod misc;
pub mod stats;

pub use misc::{falling_crossing, interp, InterpError};
pub use stats::{flux_to_mag, median, median_summary, MedianSummary};
