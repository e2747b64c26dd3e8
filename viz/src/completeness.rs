//! Per-sensor photometric completeness figure
//!
//! Four stacked log-count histograms sharing one magnitude axis:
//!
//! 1. reference objects matched against the object catalog
//! 2. reference objects matched against the source catalog, with the
//!    detection fraction `Match/Tot` on a secondary axis
//! 3. catalog objects without a detection, with `UnDet/Tot`
//! 4. detections without a catalog counterpart, with `Orph/Det`
//!
//! Panel 2 also shows how the completeness depth was found: the fitted arctan
//! model when one is available, otherwise the 0.5 level and the interpolated
//! depth.

use crate::histogram::{Histogram, RatioCurve};
use crate::{ensure_parent_dir, Result};
use log::debug;
use plotters::coord::Shift;
use plotters::prelude::*;
use shared::algo::interp;
use std::f64::consts::PI;
use std::ops::Range;
use std::path::Path;

const COUNT_MIN: f64 = 0.75;
const COUNT_MAX: f64 = 999.0;
/// Extra room past the faintest bin edge on the magnitude axis
const X_PAD_FAINT: f64 = 1.5;
/// Sampling step for the fitted model curve, in magnitudes
const MODEL_STEP: f64 = 0.1;

const STAR_COLOR: RGBColor = RGBColor(0, 160, 0);
const GALAXY_COLOR: RGBColor = RGBColor(220, 0, 0);
const ORPHAN_COLOR: RGBColor = RGBColor(0, 0, 220);

/// Magnitudes split by star/galaxy classification
#[derive(Debug, Clone, Copy, Default)]
pub struct StarGalaxySample<'a> {
    pub stars: &'a [f64],
    pub galaxies: &'a [f64],
}

/// How the completeness depth was determined for a sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrossingMarker {
    /// Parameters of `0.5 - atan(a * m + b) / pi`
    Model { a: f64, b: f64 },
    /// Interpolated depth, `None` when the fraction never crossed 0.5
    Depth(Option<f64>),
}

/// Evaluate the arctan completeness model at magnitude `m`.
pub fn arctan_model(a: f64, b: f64, m: f64) -> f64 {
    0.5 - (a * m + b).atan() / PI
}

/// Inputs for one sensor's completeness figure
#[derive(Debug, Clone)]
pub struct CompletenessPanels<'a> {
    /// Detector name, drawn as the figure title
    pub label: String,
    /// Binning shared by every histogram
    pub binning: &'a Histogram,
    pub matched_object: StarGalaxySample<'a>,
    pub matched_source: StarGalaxySample<'a>,
    pub unmatched_catalog: StarGalaxySample<'a>,
    pub unmatched_image: &'a [f64],
    pub marker: CrossingMarker,
}

struct Panel {
    title: String,
    series: Vec<(&'static str, Histogram, RGBColor)>,
    fraction: Option<(RatioCurve, &'static str)>,
    legend: bool,
}

impl<'a> CompletenessPanels<'a> {
    fn hist(&self, values: &[f64]) -> Histogram {
        self.binning.fill(values)
    }

    /// Matched / (matched + undetected) star fraction.
    ///
    /// `None` unless both samples have stars.
    pub fn detection_fraction(&self) -> Option<RatioCurve> {
        if self.matched_source.stars.is_empty() || self.unmatched_catalog.stars.is_empty() {
            return None;
        }
        let matched = self.hist(self.matched_source.stars);
        let missed = self.hist(self.unmatched_catalog.stars);
        RatioCurve::from_histograms(&matched, &missed).ok()
    }

    /// Undetected / (matched + undetected) star fraction.
    pub fn nondetection_fraction(&self) -> Option<RatioCurve> {
        if self.matched_source.stars.is_empty() || self.unmatched_catalog.stars.is_empty() {
            return None;
        }
        let matched = self.hist(self.matched_source.stars);
        let missed = self.hist(self.unmatched_catalog.stars);
        RatioCurve::from_histograms(&missed, &matched).ok()
    }

    /// Orphan detections / (orphans + matched stars).
    pub fn orphan_fraction(&self) -> Option<RatioCurve> {
        if self.unmatched_image.is_empty() || self.matched_source.stars.is_empty() {
            return None;
        }
        let orphans = self.hist(self.unmatched_image);
        let matched = self.hist(self.matched_source.stars);
        RatioCurve::from_histograms(&orphans, &matched).ok()
    }

    /// Points of the curve that explains the depth, on the secondary axis.
    ///
    /// Returns the model curve for a fit, otherwise the 0.5 level line and,
    /// when a depth exists, a vertical line at it.
    pub fn marker_lines(&self) -> Vec<Vec<(f64, f64)>> {
        let edges = self.binning.bin_edges();
        let (lo, hi) = (edges[0], edges[edges.len() - 1]);
        match self.marker {
            CrossingMarker::Model { a, b } => {
                let n = ((hi - lo) / MODEL_STEP).round() as usize + 1;
                let curve = (0..n)
                    .map(|i| lo + MODEL_STEP * i as f64)
                    .map(|m| (m, arctan_model(a, b, m)))
                    .collect();
                vec![curve]
            }
            CrossingMarker::Depth(depth) => {
                let mut lines = vec![vec![(lo, 0.5), (hi + X_PAD_FAINT, 0.5)]];
                if let Some(d) = depth {
                    lines.push(vec![(d, 0.0), (d, 1.0)]);
                }
                lines
            }
        }
    }

    fn panels(&self) -> [Panel; 4] {
        let series_for = |sample: &StarGalaxySample| {
            let mut series = Vec::new();
            if !sample.galaxies.is_empty() {
                series.push(("Galaxies", self.hist(sample.galaxies), GALAXY_COLOR));
            }
            if !sample.stars.is_empty() {
                series.push(("Stars", self.hist(sample.stars), STAR_COLOR));
            }
            series
        };

        let obj_series = series_for(&self.matched_object);
        let src_series = series_for(&self.matched_source);
        let cat_series = series_for(&self.unmatched_catalog);

        let mut image_series = Vec::new();
        if !self.unmatched_image.is_empty() {
            image_series.push(("All", self.hist(self.unmatched_image), ORPHAN_COLOR));
        }

        [
            Panel {
                title: format!(
                    "Match to Obj (G:{} S:{})",
                    self.matched_object.galaxies.len(),
                    self.matched_object.stars.len()
                ),
                legend: !obj_series.is_empty(),
                series: obj_series,
                fraction: None,
            },
            Panel {
                title: format!(
                    "Match to Src (G:{} S:{})",
                    self.matched_source.galaxies.len(),
                    self.matched_source.stars.len()
                ),
                series: src_series,
                fraction: self.detection_fraction().map(|c| (c, "Match/Tot")),
                legend: false,
            },
            Panel {
                title: format!(
                    "Unmatched Cat (G:{} S:{})",
                    self.unmatched_catalog.galaxies.len(),
                    self.unmatched_catalog.stars.len()
                ),
                series: cat_series,
                fraction: self.nondetection_fraction().map(|c| (c, "UnDet/Tot")),
                legend: false,
            },
            Panel {
                title: format!("Unmatched Image (N:{})", self.unmatched_image.len()),
                legend: !image_series.is_empty(),
                series: image_series,
                fraction: self.orphan_fraction().map(|c| (c, "Orph/Det")),
            },
        ]
    }

    /// Render the figure to a PNG file.
    pub fn render(&self, path: &Path, size: (u32, u32)) -> Result<()> {
        ensure_parent_dir(path)?;
        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;
        let root = root.titled(&self.label, ("sans-serif", 22))?;

        let edges = self.binning.bin_edges();
        let x_range = edges[0]..(edges[edges.len() - 1] + X_PAD_FAINT);
        let areas = root.split_evenly((4, 1));

        for (index, (area, panel)) in areas.iter().zip(self.panels()).enumerate() {
            let is_bottom = index == 3;
            let is_detection = index == 1;
            self.draw_panel(area, x_range.clone(), &panel, is_bottom, is_detection)?;
        }

        root.present()?;
        debug!("Completeness figure saved to {}", path.display());
        Ok(())
    }

    fn draw_panel(
        &self,
        area: &DrawingArea<BitMapBackend<'_>, Shift>,
        x_range: Range<f64>,
        panel: &Panel,
        is_bottom: bool,
        is_detection: bool,
    ) -> Result<()> {
        let max_count = panel
            .series
            .iter()
            .map(|(_, h, _)| h.max_count())
            .max()
            .unwrap_or(0) as f64;
        let count_max = COUNT_MAX.max(max_count * 1.5);

        let mut chart = ChartBuilder::on(area)
            .caption(&panel.title, ("sans-serif", 13))
            .margin(4)
            .x_label_area_size(if is_bottom { 35 } else { 20 })
            .y_label_area_size(45)
            .right_y_label_area_size(45)
            .build_cartesian_2d(x_range.clone(), (COUNT_MIN..count_max).log_scale())?
            .set_secondary_coord(x_range.clone(), 0.0f64..1.05);

        if is_bottom {
            chart
                .configure_mesh()
                .disable_mesh()
                .x_desc("Mag")
                .label_style(("sans-serif", 11))
                .draw()?;
        } else {
            chart
                .configure_mesh()
                .disable_mesh()
                .label_style(("sans-serif", 11))
                .draw()?;
        }

        let bin_edges = self.binning.bin_edges().to_vec();
        for (name, hist, color) in &panel.series {
            let color = *color;
            let bars: Vec<_> = hist
                .counts()
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(i, &count)| {
                    Rectangle::new(
                        [(bin_edges[i], COUNT_MIN), (bin_edges[i + 1], count as f64)],
                        color.mix(0.5).filled(),
                    )
                })
                .collect();
            chart.draw_series(bars)?.label(*name).legend(move |(x, y)| {
                Rectangle::new([(x, y - 4), (x + 12, y + 4)], color.mix(0.5).filled())
            });
        }

        if panel.legend {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .label_font(("sans-serif", 10))
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }

        if let Some((curve, desc)) = &panel.fraction {
            chart
                .configure_secondary_axes()
                .y_desc(*desc)
                .label_style(("sans-serif", 10))
                .draw()?;
            chart.draw_secondary_series(LineSeries::new(curve.points(), &BLUE))?;

            if is_detection {
                for line in self.marker_lines() {
                    chart.draw_secondary_series(LineSeries::new(
                        line,
                        BLACK.mix(0.25).stroke_width(1),
                    ))?;
                }
                if let CrossingMarker::Depth(Some(depth)) = self.marker {
                    if let Ok(level) = interp(depth, &curve.x, &curve.y) {
                        chart.draw_secondary_series(std::iter::once(Circle::new(
                            (depth, level),
                            3,
                            BLACK.filled(),
                        )))?;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binning() -> Histogram {
        Histogram::with_step(14.0, 27.0, 0.5).unwrap()
    }

    #[test]
    fn test_arctan_model_crosses_half_at_minus_b_over_a() {
        let (a, b) = (2.0, -48.0);
        assert!((arctan_model(a, b, 24.0) - 0.5).abs() < 1e-12);
        assert!(arctan_model(a, b, 20.0) > 0.9);
        assert!(arctan_model(a, b, 28.0) < 0.1);
    }

    #[test]
    fn test_fractions_need_both_samples() {
        let binning = binning();
        let stars = [20.0, 20.0, 21.0];
        let panels = CompletenessPanels {
            label: "R:1,1 S:1,1".to_string(),
            binning: &binning,
            matched_object: StarGalaxySample::default(),
            matched_source: StarGalaxySample {
                stars: &stars,
                galaxies: &[],
            },
            unmatched_catalog: StarGalaxySample::default(),
            unmatched_image: &[],
            marker: CrossingMarker::Depth(None),
        };
        assert!(panels.detection_fraction().is_none());
        assert!(panels.nondetection_fraction().is_none());
        assert!(panels.orphan_fraction().is_none());
    }

    #[test]
    fn test_detection_and_nondetection_fractions_sum_to_one() {
        let binning = binning();
        let matched = [20.0, 20.0, 20.0, 21.0, 21.0];
        let missed = [21.0, 21.0, 21.0, 22.0, 22.0];
        let orphans = [25.0, 25.2];
        let panels = CompletenessPanels {
            label: "R:1,1 S:1,1".to_string(),
            binning: &binning,
            matched_object: StarGalaxySample::default(),
            matched_source: StarGalaxySample {
                stars: &matched,
                galaxies: &[],
            },
            unmatched_catalog: StarGalaxySample {
                stars: &missed,
                galaxies: &[],
            },
            unmatched_image: &orphans,
            marker: CrossingMarker::Depth(Some(21.08)),
        };

        let det = panels.detection_fraction().unwrap();
        let undet = panels.nondetection_fraction().unwrap();
        assert_eq!(det.x, vec![20.25, 21.25, 22.25]);
        for (d, u) in det.y.iter().zip(&undet.y) {
            assert!((d + u - 1.0).abs() < 1e-12);
        }

        let orph = panels.orphan_fraction().unwrap();
        assert_eq!(orph.x, vec![20.25, 21.25, 25.25]);
        assert_eq!(orph.y, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_marker_lines() {
        let binning = binning();
        let mut panels = CompletenessPanels {
            label: String::new(),
            binning: &binning,
            matched_object: StarGalaxySample::default(),
            matched_source: StarGalaxySample::default(),
            unmatched_catalog: StarGalaxySample::default(),
            unmatched_image: &[],
            marker: CrossingMarker::Depth(None),
        };
        assert_eq!(panels.marker_lines().len(), 1);

        panels.marker = CrossingMarker::Depth(Some(23.4));
        let lines = panels.marker_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], vec![(23.4, 0.0), (23.4, 1.0)]);

        panels.marker = CrossingMarker::Model { a: 1.5, b: -36.0 };
        let lines = panels.marker_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 126);
        assert_eq!(lines[0][0].0, 14.0);
        assert!((lines[0][125].0 - 26.5).abs() < 1e-9);
    }

    #[test]
    #[ignore = "bitmap text rendering needs system fonts"]
    fn test_render_completeness_panels() {
        let binning = binning();
        let matched: Vec<f64> = (0..400).map(|i| 16.0 + 8.0 * (i as f64 / 400.0)).collect();
        let missed: Vec<f64> = (0..200).map(|i| 22.0 + 4.0 * (i as f64 / 200.0)).collect();
        let orphans = [24.5, 25.0, 25.5];
        let panels = CompletenessPanels {
            label: "R:2,2 S:1,1".to_string(),
            binning: &binning,
            matched_object: StarGalaxySample {
                stars: &matched,
                galaxies: &orphans,
            },
            matched_source: StarGalaxySample {
                stars: &matched,
                galaxies: &[],
            },
            unmatched_catalog: StarGalaxySample {
                stars: &missed,
                galaxies: &[],
            },
            unmatched_image: &orphans,
            marker: CrossingMarker::Model { a: 1.2, b: -28.0 },
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completeness.png");
        panels.render(&path, (800, 1000)).unwrap();
        assert!(path.exists());
    }
}
