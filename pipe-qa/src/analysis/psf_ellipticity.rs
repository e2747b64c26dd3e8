//! Median PSF ellipticity and orientation per sensor.

use super::{ccd_label, nav_map_by_name, AnalysisRun, QaAnalysis};
use crate::config::{PlotConfig, QaConfig};
use crate::data::{DataId, QaData};
use crate::testset::{QaTest, TestSet};
use crate::Result;
use log::{debug, info};
use shared::algo::{median, median_summary};
use shared::{SensorKey, SensorScalar, SensorVector};
use std::collections::BTreeSet;
use std::path::Path;
use viz::whiskers::WhiskerPlot;
use viz::{ColorScale, Colormap, FpaStyle, VectorFpaFigure};

/// Shape of one PSF from its second moments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsfShape {
    /// `1 - b/a` for the moment ellipse with semi-axes `a >= b`
    pub ellipticity: f64,
    /// Major-axis angle in radians
    pub theta: f64,
}

/// Ellipticity and angle from second moments, `None` when either is not finite.
pub fn psf_shape(ixx: f64, iyy: f64, ixy: f64) -> Option<PsfShape> {
    let mean = 0.5 * (ixx + iyy);
    let root = (0.25 * (ixx - iyy).powi(2) + ixy * ixy).sqrt();
    let a2 = mean + root;
    let b2 = mean - root;
    let ellipticity = 1.0 - (b2 / a2).sqrt();
    let theta = 0.5 * (2.0 * ixy).atan2(ixx - iyy);

    (ellipticity.is_finite() && theta.is_finite()).then_some(PsfShape { ellipticity, theta })
}

/// State of one ellipticity run, from `test()` to `plot()`
///
/// The four vectors stay aligned: entry `i` of each belongs to the same source.
#[derive(Debug)]
pub struct EllipticityRun {
    pub test_set: TestSet,
    pub x: SensorVector,
    pub y: SensorVector,
    pub ellipticity: SensorVector,
    pub theta: SensorVector,
    pub ellipticity_median: SensorScalar<f64>,
    pub theta_median: SensorScalar<f64>,
}

impl AnalysisRun for EllipticityRun {
    fn test_set(&self) -> &TestSet {
        &self.test_set
    }

    fn into_test_set(self) -> TestSet {
        self.test_set
    }
}

/// PSF ellipticity analysis
#[derive(Debug, Clone)]
pub struct PsfEllipticityQa {
    limits: [f64; 2],
    color_limits: [f64; 2],
    whisker_scale: f64,
    plot: PlotConfig,
}

impl Default for PsfEllipticityQa {
    fn default() -> Self {
        Self::from_config(&QaConfig::default())
    }
}

impl PsfEllipticityQa {
    pub fn from_config(config: &QaConfig) -> Self {
        Self {
            limits: config.ellipticity.limits,
            color_limits: config.ellipticity.color_limits,
            whisker_scale: config.ellipticity.whisker_scale,
            plot: config.plot.clone(),
        }
    }

    pub fn limits(&self) -> [f64; 2] {
        self.limits
    }
}

impl QaAnalysis for PsfEllipticityQa {
    type Run = EllipticityRun;

    fn name(&self) -> &'static str {
        "psf_ellipticity"
    }

    fn test(&self, data: &dyn QaData, id: &DataId, output_root: &Path) -> Result<EllipticityRun> {
        let source_sets = data.source_sets(id)?;
        let detectors = data.detectors(id)?;
        let filters = data.filters(id)?;

        let keys: BTreeSet<&SensorKey> = detectors.keys().chain(source_sets.keys()).collect();
        let mut run = EllipticityRun {
            test_set: self.new_test_set(id, output_root),
            x: SensorVector::new(keys.iter().copied()),
            y: SensorVector::new(keys.iter().copied()),
            ellipticity: SensorVector::new(keys.iter().copied()),
            theta: SensorVector::new(keys.iter().copied()),
            ellipticity_median: SensorScalar::new(keys.iter().copied()),
            theta_median: SensorScalar::new(keys.iter().copied()),
        };

        let mut filter = None;
        for (key, sources) in &source_sets {
            if let Some(f) = filters.get(key) {
                filter = Some(f.clone());
            }
            let mut rejected = 0usize;
            for source in sources {
                match psf_shape(source.ixx, source.iyy, source.ixy) {
                    Some(shape) => {
                        run.ellipticity.append(key, shape.ellipticity);
                        run.theta.append(key, shape.theta);
                        run.x.append(key, source.x_astrom);
                        run.y.append(key, source.y_astrom);
                    }
                    None => rejected += 1,
                }
            }
            if rejected > 0 {
                debug!("{key}: {rejected} source(s) without a usable shape");
            }
        }

        run.test_set.add_metadata("dataset", data.data_name());
        run.test_set.add_metadata("visit", &id.visit);
        run.test_set.add_metadata("filter", filter.as_deref().unwrap_or("unknown"));

        let camera = data.camera_info();
        for key in keys {
            let summary = median_summary(run.ellipticity.get(key));
            let theta = median(run.theta.get(key));
            if let (Some(e), Some(t)) = (summary.median, theta) {
                run.ellipticity_median.set(key, e);
                run.theta_median.set(key, t);
            }

            let label = format!("median psf ellipticity {}", ccd_label(&key.ccd));
            let comment = format!("median psf ellipticity (nstar={})", summary.n);
            run.test_set.add_test(
                QaTest::new(label, summary.median, self.limits, comment)
                    .with_area_label(camera.detector_name(key)),
            );
        }

        info!(
            "PSF ellipticity for {id}: {} source(s) on {} sensor(s)",
            run.ellipticity.total_count(),
            run.ellipticity.len()
        );
        Ok(run)
    }

    fn plot(&self, data: &dyn QaData, run: EllipticityRun) -> Result<TestSet> {
        let EllipticityRun {
            mut test_set,
            x,
            y,
            ellipticity,
            theta,
            ellipticity_median,
            theta_median,
        } = run;
        let camera = data.camera_info();

        let mut fig = VectorFpaFigure::new(&camera.array);
        for (key, &e) in ellipticity_median.defined() {
            let t = theta_median.get(key).copied().unwrap_or(0.0);
            fig.set(key, t, e, format!("ell/theta={:.3}/{:.0}", e, t.to_degrees()));
        }

        let [vmin, vmax] = self.color_limits;
        let style = FpaStyle::new(
            "Median PSF Ellipticity",
            ColorScale::new(Colormap::YlOrRd, vmin, vmax),
        )
        .with_show_undefined(self.plot.show_undefined)
        .with_size(self.plot.fpa_size);
        let filename = "medPsfEllip.png";
        fig.render(&camera.array, &test_set.figure_path(filename, None), &style)?;
        test_set.add_figure(
            filename,
            "Median PSF Ellipticity",
            None,
            Some(nav_map_by_name(camera, fig.nav_map())),
        );

        for key in ellipticity.keys() {
            let e = ellipticity.get(key);
            if e.is_empty() {
                debug!("{key}: no sources, skipping whisker plot");
                continue;
            }

            let area = camera.detector_name(key);
            let mut whiskers = WhiskerPlot::new(
                format!("PSF ellipticity {area}"),
                x.get(key),
                y.get(key),
                e,
                theta.get(key),
            )?;
            whiskers.length_scale = self.whisker_scale;

            let filename = format!("psfEllip_{}.png", ccd_label(&key.ccd));
            let path = test_set.figure_path(&filename, Some(area.as_str()));
            whiskers.render(&path, self.plot.whisker_size)?;
            test_set.add_figure(&filename, "PSF ellipticity", Some(area.as_str()), None);
        }

        Ok(test_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn test_round_psf_has_zero_ellipticity() {
        let shape = psf_shape(2.5, 2.5, 0.0).unwrap();
        assert!(shape.ellipticity.abs() < 1e-12);
        assert_eq!(shape.theta, 0.0);
    }

    #[test]
    fn test_zero_moments_are_rejected() {
        assert!(psf_shape(0.0, 0.0, 0.0).is_none());
        assert!(psf_shape(f64::NAN, 1.0, 0.0).is_none());
    }

    #[test]
    fn test_elongated_along_x() {
        // a^2 = 4, b^2 = 1 -> 1 - 1/2
        let shape = psf_shape(4.0, 1.0, 0.0).unwrap();
        assert!((shape.ellipticity - 0.5).abs() < 1e-12);
        assert!(shape.theta.abs() < 1e-12);
    }

    #[test]
    fn test_diagonal_orientation() {
        let shape = psf_shape(2.0, 2.0, 1.0).unwrap();
        assert!((shape.theta - FRAC_PI_4).abs() < 1e-12);
        // a^2 = 3, b^2 = 1
        assert!((shape.ellipticity - (1.0 - (1.0f64 / 3.0).sqrt())).abs() < 1e-12);
    }
}
