//! Visualization toolkit for focal-plane quality assessment.
//!
//! Everything a QA report draws lives here:
//!
//! - [`histogram`]: fixed-bin magnitude histograms and bin-by-bin ratio curves
//! - [`colormap`]: diverging and sequential color scales with over/under colors
//! - [`fpa`]: focal-plane-array figures, one cell per sensor, either as a
//!   scalar heat map or as an oriented segment per sensor
//! - [`completeness`]: the four-panel per-sensor detection histogram figure
//! - [`whiskers`]: per-sensor PSF ellipticity whisker plots
//!
//! Figures are written as PNG files through the plotters bitmap backend.

use plotters::drawing::DrawingAreaErrorKind;
use thiserror::Error;

/// Error types for visualization operations.
#[derive(Debug, Error)]
pub enum VizError {
    /// Histogram creation or analysis error.
    ///
    /// Includes issues with bin configuration and mismatched binning.
    #[error("Histogram error: {0}")]
    HistogramError(String),

    /// Failure reported by the plotting backend while drawing.
    #[error("Plotting error: {0}")]
    PlotError(String),

    /// Creating the output directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl<E> From<DrawingAreaErrorKind<E>> for VizError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        VizError::PlotError(err.to_string())
    }
}

/// Standard Result type for all visualization operations.
pub type Result<T> = std::result::Result<T, VizError>;

pub mod colormap;
pub mod completeness;
pub mod fpa;
pub mod histogram;
pub mod whiskers;

pub use colormap::{ColorScale, Colormap};
pub use fpa::{FpaFigure, FpaStyle, VectorFpaFigure};
pub use histogram::{Histogram, RatioCurve};

/// Make sure the parent directory of an output file exists.
pub(crate) fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
