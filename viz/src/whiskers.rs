//! Whisker plots of PSF ellipticity across a sensor
//!
//! Each source becomes a line segment centred on its pixel position, oriented
//! along the PSF major axis, with length proportional to its ellipticity.

use crate::{ensure_parent_dir, Result, VizError};
use log::debug;
use plotters::prelude::*;
use std::path::Path;

/// Segment length in pixels for unit ellipticity
pub const DEFAULT_LENGTH_SCALE: f64 = 1000.0;

/// Axis limits are rounded to multiples of this many pixels.
const AXIS_QUANTUM: f64 = 1024.0;

/// Per-source whisker data for one sensor
#[derive(Debug, Clone)]
pub struct WhiskerPlot<'a> {
    pub title: String,
    pub x: &'a [f64],
    pub y: &'a [f64],
    pub ellipticity: &'a [f64],
    /// Major-axis angle in radians
    pub theta: &'a [f64],
    pub length_scale: f64,
}

impl<'a> WhiskerPlot<'a> {
    pub fn new(
        title: impl Into<String>,
        x: &'a [f64],
        y: &'a [f64],
        ellipticity: &'a [f64],
        theta: &'a [f64],
    ) -> Result<Self> {
        let n = x.len();
        if y.len() != n || ellipticity.len() != n || theta.len() != n {
            return Err(VizError::PlotError(format!(
                "Whisker inputs differ in length: x={} y={} e={} theta={}",
                n,
                y.len(),
                ellipticity.len(),
                theta.len()
            )));
        }
        Ok(Self {
            title: title.into(),
            x,
            y,
            ellipticity,
            theta,
            length_scale: DEFAULT_LENGTH_SCALE,
        })
    }

    /// End points of every whisker.
    pub fn segments(&self) -> Vec<((f64, f64), (f64, f64))> {
        self.x
            .iter()
            .zip(self.y)
            .zip(self.ellipticity.iter().zip(self.theta))
            .map(|((&x, &y), (&e, &theta))| {
                let dx = 0.5 * self.length_scale * e * theta.cos();
                let dy = 0.5 * self.length_scale * e * theta.sin();
                ((x - dx, y - dy), (x + dx, y + dy))
            })
            .collect()
    }

    /// Upper x and y limits, the maximum segment start rounded to the nearest
    /// multiple of 1024 and never below 1024.
    pub fn axis_limits(&self) -> (f64, f64) {
        let segments = self.segments();
        let max_x = segments
            .iter()
            .map(|(start, _)| start.0)
            .fold(0.0f64, f64::max);
        let max_y = segments
            .iter()
            .map(|(start, _)| start.1)
            .fold(0.0f64, f64::max);
        (round_to_quantum(max_x), round_to_quantum(max_y))
    }

    /// Render the whiskers to a PNG file.
    pub fn render(&self, path: &Path, size: (u32, u32)) -> Result<()> {
        ensure_parent_dir(path)?;
        let (x_max, y_max) = self.axis_limits();

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&self.title, ("sans-serif", 22))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..x_max, 0.0..y_max)?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("x [pixels]")
            .y_desc("y [pixels]")
            .draw()?;

        chart.draw_series(
            self.segments()
                .into_iter()
                .map(|(a, b)| PathElement::new(vec![a, b], BLACK.stroke_width(1))),
        )?;

        root.present()?;
        debug!("Whisker plot saved to {}", path.display());
        Ok(())
    }
}

fn round_to_quantum(value: f64) -> f64 {
    (AXIS_QUANTUM * (value / AXIS_QUANTUM + 0.5).floor()).max(AXIS_QUANTUM)
}
