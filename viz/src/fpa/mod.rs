//! Focal-plane-array figures
//!
//! Both figure types draw one cell per sensor at its position in the focal
//! plane. [`FpaFigure`] colors each cell by a scalar value; [`VectorFpaFigure`]
//! draws an oriented segment per sensor whose length and color encode a
//! magnitude. Each figure also carries a short per-sensor label used as a
//! navigation map by report viewers.

use crate::colormap::ColorScale;
use crate::{ensure_parent_dir, Result};
use log::debug;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use shared::{PositionedSensor, SensorArray, SensorKey};
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

/// Appearance of a focal-plane figure
#[derive(Debug, Clone)]
pub struct FpaStyle {
    /// Figure title
    pub title: String,
    /// Output size in pixels
    pub size: (u32, u32),
    /// Value to color mapping, also drawn as a color bar
    pub scale: ColorScale,
    /// Fill sensors without a value with the scale's undefined color
    pub show_undefined: bool,
    /// Sensors whose value falls outside these limits are crossed out
    pub fail_limits: Option<(f64, f64)>,
}

impl FpaStyle {
    pub fn new(title: impl Into<String>, scale: ColorScale) -> Self {
        Self {
            title: title.into(),
            size: (900, 800),
            scale,
            show_undefined: false,
            fail_limits: None,
        }
    }

    pub fn with_fail_limits(mut self, limits: (f64, f64)) -> Self {
        self.fail_limits = Some(limits);
        self
    }

    pub fn with_size(mut self, size: (u32, u32)) -> Self {
        self.size = size;
        self
    }

    pub fn with_show_undefined(mut self, show: bool) -> Self {
        self.show_undefined = show;
        self
    }
}

const COLORBAR_WIDTH: i32 = 110;

/// Plot extent covering every sensor with a 5% margin.
fn padded_extent(array: &SensorArray) -> (Range<f64>, Range<f64>) {
    let (min_x, min_y, max_x, max_y) = array.total_aabb_mm().unwrap_or((-1.0, -1.0, 1.0, 1.0));
    let pad_x = 0.05 * (max_x - min_x).max(1.0);
    let pad_y = 0.05 * (max_y - min_y).max(1.0);
    (
        (min_x - pad_x)..(max_x + pad_x),
        (min_y - pad_y)..(max_y + pad_y),
    )
}

fn center(sensor: &PositionedSensor) -> (f64, f64) {
    (sensor.position.x_mm, sensor.position.y_mm)
}

fn label_style() -> TextStyle<'static> {
    TextStyle::from(("sans-serif", 11).into_font()).pos(Pos::new(HPos::Center, VPos::Center))
}

/// Vertical color bar for `scale` drawn into `area`.
fn draw_colorbar(area: &DrawingArea<BitMapBackend<'_>, Shift>, scale: &ColorScale) -> Result<()> {
    let (vmin, vmax) = if scale.vmax > scale.vmin {
        (scale.vmin, scale.vmax)
    } else {
        (scale.vmin - 0.5, scale.vmin + 0.5)
    };

    let mut chart = ChartBuilder::on(area)
        .margin_top(50)
        .margin_bottom(30)
        .margin_right(10)
        .y_label_area_size(55)
        .build_cartesian_2d(0.0f64..1.0, vmin..vmax)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .disable_x_axis()
        .y_labels(6)
        .y_label_formatter(&|v| format!("{v:.2}"))
        .draw()?;

    const STEPS: usize = 64;
    let dv = (vmax - vmin) / STEPS as f64;
    chart.draw_series((0..STEPS).map(|i| {
        let v0 = vmin + dv * i as f64;
        Rectangle::new(
            [(0.0, v0), (1.0, v0 + dv)],
            scale.cmap.sample(scale.normalize(v0 + 0.5 * dv)).filled(),
        )
    }))?;

    Ok(())
}

/// Sensor mosaic colored by one scalar per sensor
#[derive(Debug, Clone, Default)]
pub struct FpaFigure {
    values: BTreeMap<SensorKey, Option<f64>>,
    labels: BTreeMap<SensorKey, String>,
}

impl FpaFigure {
    /// Figure with every sensor of the array present but undefined.
    pub fn new(array: &SensorArray) -> Self {
        Self {
            values: array.keys().map(|k| (k.clone(), None)).collect(),
            labels: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, key: &SensorKey, value: f64, label: impl Into<String>) {
        self.values.insert(key.clone(), Some(value));
        self.labels.insert(key.clone(), label.into());
    }

    pub fn value(&self, key: &SensorKey) -> Option<f64> {
        self.values.get(key).copied().flatten()
    }

    /// Per-sensor labels for report navigation
    pub fn nav_map(&self) -> &BTreeMap<SensorKey, String> {
        &self.labels
    }

    /// Sensors whose value lies outside `limits`.
    pub fn failing(&self, limits: (f64, f64)) -> Vec<&SensorKey> {
        self.values
            .iter()
            .filter(|(_, v)| matches!(v, Some(v) if *v < limits.0 || *v > limits.1))
            .map(|(k, _)| k)
            .collect()
    }

    /// Render the figure to a PNG file.
    pub fn render(&self, array: &SensorArray, path: &Path, style: &FpaStyle) -> Result<()> {
        ensure_parent_dir(path)?;
        let root = BitMapBackend::new(path, style.size).into_drawing_area();
        root.fill(&WHITE)?;
        let (plot_area, bar_area) = root.split_horizontally(style.size.0 as i32 - COLORBAR_WIDTH);

        let (x_range, y_range) = padded_extent(array);
        let mut chart = ChartBuilder::on(&plot_area)
            .caption(&style.title, ("sans-serif", 26))
            .margin(15)
            .build_cartesian_2d(x_range, y_range)?;

        let cells: Vec<(&PositionedSensor, Option<f64>)> = array
            .sensors
            .iter()
            .map(|s| (s, self.value(&s.key)))
            .collect();

        chart.draw_series(
            cells
                .iter()
                .filter(|(_, v)| v.is_some() || style.show_undefined)
                .map(|(s, v)| {
                    let (x0, y0, x1, y1) = s.aabb_mm();
                    Rectangle::new([(x0, y0), (x1, y1)], style.scale.color(*v).filled())
                }),
        )?;

        chart.draw_series(cells.iter().map(|(s, _)| {
            let (x0, y0, x1, y1) = s.aabb_mm();
            Rectangle::new([(x0, y0), (x1, y1)], BLACK.stroke_width(1))
        }))?;

        if let Some(limits) = style.fail_limits {
            let failing = self.failing(limits);
            chart.draw_series(
                cells
                    .iter()
                    .filter(|(s, _)| failing.contains(&&s.key))
                    .flat_map(|(s, _)| {
                        let (x0, y0, x1, y1) = s.aabb_mm();
                        [
                            PathElement::new(vec![(x0, y0), (x1, y1)], BLACK.stroke_width(2)),
                            PathElement::new(vec![(x0, y1), (x1, y0)], BLACK.stroke_width(2)),
                        ]
                    }),
            )?;
        }

        chart.draw_series(
            cells
                .iter()
                .map(|(s, _)| Text::new(s.key.ccd.clone(), center(s), label_style())),
        )?;

        draw_colorbar(&bar_area, &style.scale)?;
        root.present()?;
        debug!("FPA figure saved to {}", path.display());
        Ok(())
    }
}

/// Sensor mosaic with one oriented segment per sensor
///
/// Segment orientation is the sensor's angle (radians, counter-clockwise from
/// +x); its length and color both follow the magnitude through the style's
/// color scale, a magnitude at or above `vmax` spanning most of the cell.
#[derive(Debug, Clone, Default)]
pub struct VectorFpaFigure {
    values: BTreeMap<SensorKey, Option<(f64, f64)>>,
    labels: BTreeMap<SensorKey, String>,
}

impl VectorFpaFigure {
    pub fn new(array: &SensorArray) -> Self {
        Self {
            values: array.keys().map(|k| (k.clone(), None)).collect(),
            labels: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, key: &SensorKey, angle: f64, magnitude: f64, label: impl Into<String>) {
        self.values.insert(key.clone(), Some((angle, magnitude)));
        self.labels.insert(key.clone(), label.into());
    }

    /// `(angle, magnitude)` for a sensor
    pub fn value(&self, key: &SensorKey) -> Option<(f64, f64)> {
        self.values.get(key).copied().flatten()
    }

    pub fn nav_map(&self) -> &BTreeMap<SensorKey, String> {
        &self.labels
    }

    /// End points of the segment drawn for `sensor`, or `None` without a value.
    pub fn segment(
        &self,
        sensor: &PositionedSensor,
        scale: &ColorScale,
    ) -> Option<((f64, f64), (f64, f64))> {
        let (angle, magnitude) = self.value(&sensor.key)?;
        if !angle.is_finite() || !magnitude.is_finite() {
            return None;
        }
        let extent = sensor.width_mm.min(sensor.height_mm);
        let half = 0.45 * extent * scale.normalize(magnitude).clamp(0.0, 1.0);
        let (cx, cy) = center(sensor);
        let (dx, dy) = (half * angle.cos(), half * angle.sin());
        Some(((cx - dx, cy - dy), (cx + dx, cy + dy)))
    }

    /// Render the figure to a PNG file.
    pub fn render(&self, array: &SensorArray, path: &Path, style: &FpaStyle) -> Result<()> {
        ensure_parent_dir(path)?;
        let root = BitMapBackend::new(path, style.size).into_drawing_area();
        root.fill(&WHITE)?;
        let (plot_area, bar_area) = root.split_horizontally(style.size.0 as i32 - COLORBAR_WIDTH);

        let (x_range, y_range) = padded_extent(array);
        let mut chart = ChartBuilder::on(&plot_area)
            .caption(&style.title, ("sans-serif", 26))
            .margin(15)
            .build_cartesian_2d(x_range, y_range)?;

        if style.show_undefined {
            chart.draw_series(
                array
                    .sensors
                    .iter()
                    .filter(|s| self.value(&s.key).is_none())
                    .map(|s| {
                        let (x0, y0, x1, y1) = s.aabb_mm();
                        Rectangle::new([(x0, y0), (x1, y1)], style.scale.undefined.filled())
                    }),
            )?;
        }

        chart.draw_series(array.sensors.iter().map(|s| {
            let (x0, y0, x1, y1) = s.aabb_mm();
            Rectangle::new([(x0, y0), (x1, y1)], BLACK.stroke_width(1))
        }))?;

        chart.draw_series(array.sensors.iter().filter_map(|s| {
            let (start, end) = self.segment(s, &style.scale)?;
            let magnitude = self.value(&s.key).map(|(_, m)| m);
            Some(PathElement::new(
                vec![start, end],
                style.scale.color(magnitude).stroke_width(3),
            ))
        }))?;

        draw_colorbar(&bar_area, &style.scale)?;
        root.present()?;
        debug!("Vector FPA figure saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::Colormap;

    fn array() -> SensorArray {
        SensorArray::grid(1, 1, 2, 2, 40.0, 1.0, (4096, 4096))
    }

    #[test]
    fn test_fpa_figure_starts_undefined() {
        let array = array();
        let fig = FpaFigure::new(&array);
        for key in array.keys() {
            assert!(fig.value(key).is_none());
        }
        assert!(fig.nav_map().is_empty());
    }

    #[test]
    fn test_fpa_figure_failing_sensors() {
        let array = array();
        let keys: Vec<_> = array.keys().cloned().collect();
        let mut fig = FpaFigure::new(&array);
        fig.set(&keys[0], 24.0, "mag=24.00");
        fig.set(&keys[1], 21.0, "mag=21.00");
        fig.set(&keys[2], 27.5, "mag=27.50");

        let failing = fig.failing((22.0, 26.0));
        assert_eq!(failing.len(), 2);
        assert!(failing.contains(&&keys[1]));
        assert!(failing.contains(&&keys[2]));
        assert_eq!(fig.nav_map().get(&keys[0]).unwrap(), "mag=24.00");
    }

    #[test]
    fn test_vector_segment_geometry() {
        let array = array();
        let sensor = &array.sensors[0];
        let scale = ColorScale::new(Colormap::YlOrRd, 0.0, 0.1);
        let mut fig = VectorFpaFigure::new(&array);
        assert!(fig.segment(sensor, &scale).is_none());

        fig.set(&sensor.key, 0.0, 0.05, "ell/theta=0.050/0");
        let ((x0, y0), (x1, y1)) = fig.segment(sensor, &scale).unwrap();
        // half the scale range gives half of the maximum half-length
        assert!((x1 - x0 - 2.0 * 0.45 * 40.0 * 0.5).abs() < 1e-9);
        assert!((y1 - y0).abs() < 1e-12);
        assert!(((x0 + x1) / 2.0 - sensor.position.x_mm).abs() < 1e-12);
    }

    #[test]
    fn test_vector_segment_saturates_above_vmax() {
        let array = array();
        let sensor = &array.sensors[1];
        let scale = ColorScale::new(Colormap::YlOrRd, 0.0, 0.1);
        let mut fig = VectorFpaFigure::new(&array);
        fig.set(&sensor.key, std::f64::consts::FRAC_PI_2, 0.9, "");
        let ((x0, y0), (x1, y1)) = fig.segment(sensor, &scale).unwrap();
        assert!((y1 - y0 - 0.9 * 40.0).abs() < 1e-9);
        assert!((x1 - x0).abs() < 1e-9);
    }

    #[test]
    #[ignore = "bitmap text rendering needs system fonts"]
    fn test_render_fpa_figures() {
        let array = SensorArray::grid(3, 3, 3, 3, 40.0, 1.0, (4096, 4096));
        let dir = tempfile::tempdir().unwrap();

        let mut depth = FpaFigure::new(&array);
        let mut ellip = VectorFpaFigure::new(&array);
        for (i, key) in array.keys().enumerate() {
            let value = 21.0 + (i % 7) as f64;
            depth.set(key, value, format!("mag={value:.2}"));
            ellip.set(key, i as f64 * 0.3, 0.01 * (i % 12) as f64, "");
        }

        let scale = ColorScale::new(Colormap::RdBuR, 22.0, 26.0)
            .with_over_under(RGBColor(255, 0, 0), RGBColor(0, 0, 255));
        let style = FpaStyle::new("Photometric Depth", scale).with_fail_limits((22.0, 26.0));
        let depth_path = dir.path().join("depth.png");
        depth.render(&array, &depth_path, &style).unwrap();
        assert!(depth_path.exists());

        let style = FpaStyle::new(
            "Median PSF Ellipticity",
            ColorScale::new(Colormap::YlOrRd, 0.0, 0.1),
        );
        let ellip_path = dir.path().join("ellip.png");
        ellip.render(&array, &ellip_path, &style).unwrap();
        assert!(ellip_path.exists());
    }
}
