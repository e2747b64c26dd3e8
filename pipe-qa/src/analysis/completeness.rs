//! Photometric completeness depth per sensor.
//!
//! Reference-catalog stars are split into those matched to a detection and
//! those without one. Both sets are binned in magnitude; the depth is the
//! magnitude where the matched fraction falls through 0.5.

use super::{nav_map_by_name, AnalysisRun, QaAnalysis};
use crate::config::{PlotConfig, QaConfig};
use crate::data::{
    BySensor, DataId, DetectionFlags, Detector, FluxType, MatchReference, QaData, SourceMatch,
};
use crate::fit::{validated_crossing, ArctanFit, DepthFitter, FitError, LevenbergMarquardt};
use crate::testset::{QaTest, TestSet};
use crate::Result;
use log::{debug, info};
use plotters::style::RGBColor;
use shared::algo::{falling_crossing, flux_to_mag};
use shared::{SensorKey, SensorScalar, SensorVector};
use std::collections::HashSet;
use std::path::Path;
use viz::completeness::{CompletenessPanels, CrossingMarker, StarGalaxySample};
use viz::{ColorScale, Colormap, FpaFigure, FpaStyle, Histogram, RatioCurve};

const DEPTH_LABEL: &str = "photometric depth";
const DEPTH_COMMENT: &str = "magnitude where star completeness drops below 0.5";
const COMPLETENESS_LEVEL: f64 = 0.5;

/// Depth estimate for one sensor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompletenessDepth {
    /// `None` when the detection fraction never falls through 0.5
    pub magnitude: Option<f64>,
    /// Model parameters when the depth came from a fit
    pub fit: Option<ArctanFit>,
}

impl CompletenessDepth {
    /// Depth, or `0.0` when undefined.
    pub fn magnitude_or_sentinel(&self) -> f64 {
        self.magnitude.unwrap_or(0.0)
    }

    pub fn is_defined(&self) -> bool {
        self.magnitude.is_some()
    }
}

/// Star and galaxy magnitudes of one category
#[derive(Debug, Clone)]
pub struct StarGalaxyVectors {
    pub stars: SensorVector,
    pub galaxies: SensorVector,
}

impl StarGalaxyVectors {
    fn new(keys: &[SensorKey]) -> Self {
        Self {
            stars: SensorVector::new(keys),
            galaxies: SensorVector::new(keys),
        }
    }

    fn sample(&self, key: &SensorKey) -> StarGalaxySample<'_> {
        StarGalaxySample {
            stars: self.stars.get(key),
            galaxies: self.galaxies.get(key),
        }
    }
}

/// State of one completeness run, from `test()` to `plot()`
#[derive(Debug)]
pub struct CompletenessRun {
    pub test_set: TestSet,
    pub detectors: BySensor<Detector>,
    /// Reference magnitudes matched against the object catalog
    pub matched_object: StarGalaxyVectors,
    /// Reference magnitudes matched against the source catalog
    pub matched_source: StarGalaxyVectors,
    /// Catalog magnitudes of reference objects that were not detected
    pub unmatched_catalog: StarGalaxyVectors,
    /// Instrumental magnitudes of detections without a reference object
    pub unmatched_image: SensorVector,
    pub depth: SensorScalar<CompletenessDepth>,
}

impl AnalysisRun for CompletenessRun {
    fn test_set(&self) -> &TestSet {
        &self.test_set
    }

    fn into_test_set(self) -> TestSet {
        self.test_set
    }
}

/// Matches that passed the quality cuts
#[derive(Debug, Default)]
struct MatchSplit {
    source_ids: HashSet<u64>,
    ref_ids: HashSet<u64>,
    stars: Vec<f64>,
    galaxies: Vec<f64>,
}

/// Photometric completeness analysis
#[derive(Debug)]
pub struct CompletenessQa {
    limits: [f64; 2],
    binning: Histogram,
    flux_type: FluxType,
    fitter: Option<Box<dyn DepthFitter>>,
    plot: PlotConfig,
}

impl CompletenessQa {
    /// Analysis with the default binning, PSF fluxes and no fitter.
    pub fn new(mag_min: f64, mag_max: f64) -> Result<Self> {
        let mut config = QaConfig::default();
        config.completeness.mag_limits = [mag_min, mag_max];
        config.completeness.use_fitter = false;
        Self::from_config(&config)
    }

    pub fn from_config(config: &QaConfig) -> Result<Self> {
        let c = &config.completeness;
        let binning = Histogram::with_step(c.bin_start, c.bin_stop, c.bin_width)?;
        let fitter: Option<Box<dyn DepthFitter>> = if c.use_fitter {
            Some(Box::new(LevenbergMarquardt::default()))
        } else {
            None
        };
        Ok(Self {
            limits: c.mag_limits,
            binning,
            flux_type: c.flux_type,
            fitter,
            plot: config.plot.clone(),
        })
    }

    /// Refine depths with `fitter`.
    pub fn with_fitter(mut self, fitter: Box<dyn DepthFitter>) -> Self {
        self.fitter = Some(fitter);
        self
    }

    pub fn without_fitter(mut self) -> Self {
        self.fitter = None;
        self
    }

    pub fn with_flux_type(mut self, flux_type: FluxType) -> Self {
        self.flux_type = flux_type;
        self
    }

    pub fn limits(&self) -> [f64; 2] {
        self.limits
    }

    pub fn binning(&self) -> &Histogram {
        &self.binning
    }

    /// Fraction of stars detected per magnitude bin.
    pub fn detection_curve(&self, matched: &[f64], unmatched: &[f64]) -> RatioCurve {
        let matched = self.binning.fill(matched);
        let unmatched = self.binning.fill(unmatched);
        RatioCurve::new(&matched.bin_centers(), matched.counts(), unmatched.counts())
    }

    /// Depth from the matched and unmatched star magnitudes of one sensor.
    ///
    /// With a fitter the model crossing is used when the fit succeeds;
    /// otherwise the interpolated crossing.
    pub fn limiting_mag(&self, matched: &[f64], unmatched: &[f64]) -> Result<CompletenessDepth> {
        let curve = self.detection_curve(matched, unmatched);
        let interpolated = falling_crossing(COMPLETENESS_LEVEL, &curve.x, &curve.y)?;

        if let Some(fitter) = &self.fitter {
            match fit_depth(fitter.as_ref(), &curve, interpolated) {
                Ok((magnitude, fit)) => {
                    return Ok(CompletenessDepth {
                        magnitude: Some(magnitude),
                        fit: Some(fit),
                    });
                }
                Err(e) => debug!("Completeness fit failed, using interpolation: {e}"),
            }
        }

        Ok(CompletenessDepth {
            magnitude: interpolated,
            fit: None,
        })
    }

    fn split_matches(&self, matches: &[SourceMatch]) -> MatchSplit {
        let mut split = MatchSplit::default();
        for m in matches {
            let ref_flux = m.reference.psf_flux;
            let flux = m.source.flux(self.flux_type);
            let bad_center = m.source.flags.intersects(DetectionFlags::BAD_CENTER);
            if !(ref_flux > 0.0 && flux > 0.0) || bad_center {
                continue;
            }

            split.source_ids.insert(m.source.id);
            split.ref_ids.insert(m.reference.id);

            let mag = flux_to_mag(ref_flux);
            if !mag.is_finite() {
                continue;
            }
            if m.source.is_star() {
                split.stars.push(mag);
            } else {
                split.galaxies.push(mag);
            }
        }
        split
    }
}

/// Fit the arctan model to a detection curve and return its crossing.
fn fit_depth(
    fitter: &dyn DepthFitter,
    curve: &RatioCurve,
    interpolated: Option<f64>,
) -> std::result::Result<(f64, ArctanFit), FitError> {
    let mut x = Vec::with_capacity(curve.len());
    let mut y = Vec::with_capacity(curve.len());
    let mut dy = Vec::with_capacity(curve.len());
    for i in 0..curve.len() {
        let err = curve.numerator[i].sqrt() / curve.total[i];
        if err == 0.0 {
            continue;
        }
        x.push(curve.x[i]);
        y.push(curve.y[i]);
        dy.push(err);
    }
    if x.is_empty() {
        return Err(FitError::TooFewPoints { needed: 3, got: 0 });
    }

    let center = interpolated.unwrap_or_else(|| x.iter().sum::<f64>() / x.len() as f64);
    let fit = fitter.fit(&x, &y, &dy, (1.0, -center))?;
    let crossing = validated_crossing(&fit, &x)?;
    Ok((crossing, fit))
}

impl QaAnalysis for CompletenessQa {
    type Run = CompletenessRun;

    fn name(&self) -> &'static str {
        "completeness"
    }

    fn test(&self, data: &dyn QaData, id: &DataId, output_root: &Path) -> Result<CompletenessRun> {
        let mut test_set = self.new_test_set(id, output_root);
        test_set.add_metadata("dataset", data.data_name());
        test_set.add_metadata("visit", &id.visit);
        test_set.add_metadata("flux_type", self.flux_type);

        let detectors = data.detectors(id)?;
        let filters = data.filters(id)?;
        let object_matches = data.match_lists(id, MatchReference::Object)?;
        let source_matches = data.match_lists(id, MatchReference::Source)?;
        let source_sets = data.source_sets(id)?;
        let ref_object_sets = data.ref_object_sets(id)?;

        let keys: Vec<SensorKey> = detectors.keys().cloned().collect();
        let mut run = CompletenessRun {
            test_set,
            detectors,
            matched_object: StarGalaxyVectors::new(&keys),
            matched_source: StarGalaxyVectors::new(&keys),
            unmatched_catalog: StarGalaxyVectors::new(&keys),
            unmatched_image: SensorVector::new(&keys),
            depth: SensorScalar::new(&keys),
        };

        for key in &keys {
            let filter = filters.get(key).map(String::as_str).unwrap_or_default();

            // Detections and references count as matched only through the
            // source-catalog list.
            let mut matched = MatchSplit::default();
            for (lists, reference) in [
                (&object_matches, MatchReference::Object),
                (&source_matches, MatchReference::Source),
            ] {
                let split = lists
                    .get(key)
                    .map(|m| self.split_matches(m))
                    .unwrap_or_default();
                let target = match reference {
                    MatchReference::Object => &mut run.matched_object,
                    MatchReference::Source => &mut run.matched_source,
                };
                target.stars.set(key, split.stars.clone());
                target.galaxies.set(key, split.galaxies.clone());
                matched = split;
            }

            let orphans: Vec<f64> = source_sets
                .get(key)
                .into_iter()
                .flatten()
                .filter(|s| !matched.source_ids.contains(&s.id))
                .map(|s| s.flux(self.flux_type))
                .filter(|&f| f > 0.0)
                .map(flux_to_mag)
                .filter(|m| m.is_finite())
                .collect();
            run.unmatched_image.set(key, orphans);

            for obj in ref_object_sets.get(key).into_iter().flatten() {
                if matched.ref_ids.contains(&obj.id) {
                    continue;
                }
                let mag = obj.mag(filter);
                if !mag.is_finite() {
                    continue;
                }
                if obj.is_star {
                    run.unmatched_catalog.stars.append(key, mag);
                } else {
                    run.unmatched_catalog.galaxies.append(key, mag);
                }
            }

            let depth = self.limiting_mag(
                run.matched_source.stars.get(key),
                run.unmatched_catalog.stars.get(key),
            )?;
            debug!(
                "{key}: {} matched stars, {} missed stars, depth {:?}",
                run.matched_source.stars.get(key).len(),
                run.unmatched_catalog.stars.get(key).len(),
                depth.magnitude
            );
            run.depth.set(key, depth);

            let area_label = data.camera_info().detector_name(key);
            run.test_set.add_test(
                QaTest::new(DEPTH_LABEL, depth.magnitude, self.limits, DEPTH_COMMENT)
                    .with_area_label(area_label),
            );
        }

        info!(
            "Completeness for {id}: {} of {} sensors have a depth",
            run.depth.defined().filter(|(_, d)| d.is_defined()).count(),
            keys.len()
        );
        Ok(run)
    }

    fn plot(&self, data: &dyn QaData, run: CompletenessRun) -> Result<TestSet> {
        let CompletenessRun {
            mut test_set,
            matched_object,
            matched_source,
            unmatched_catalog,
            unmatched_image,
            depth,
            ..
        } = run;
        let camera = data.camera_info();

        let mut depth_fig = FpaFigure::new(&camera.array);
        for (key, d) in depth.defined() {
            if let Some(mag) = d.magnitude {
                depth_fig.set(key, mag, format!("mag={mag:.2}"));
            }
        }

        let [vmin, vmax] = self.limits;
        let scale = ColorScale::new(Colormap::RdBuR, vmin, vmax)
            .with_over_under(RGBColor(255, 0, 0), RGBColor(0, 0, 255));
        let style = FpaStyle::new("Photometric Depth", scale)
            .with_fail_limits((vmin, vmax))
            .with_show_undefined(self.plot.show_undefined)
            .with_size(self.plot.fpa_size);
        let filename = "completenessDepth.png";
        depth_fig.render(&camera.array, &test_set.figure_path(filename, None), &style)?;
        test_set.add_figure(
            filename,
            "Estimate of photometric depth",
            None,
            Some(nav_map_by_name(camera, depth_fig.nav_map())),
        );

        for (key, d) in depth.iter() {
            let label = camera.detector_name(key);
            let marker = match d.and_then(|d| d.fit) {
                Some(fit) => CrossingMarker::Model { a: fit.a, b: fit.b },
                None => CrossingMarker::Depth(d.and_then(|d| d.magnitude)),
            };
            let panels = CompletenessPanels {
                label: label.clone(),
                binning: &self.binning,
                matched_object: matched_object.sample(key),
                matched_source: matched_source.sample(key),
                unmatched_catalog: unmatched_catalog.sample(key),
                unmatched_image: unmatched_image.get(key),
                marker,
            };

            let filename = "completeness.png";
            let path = test_set.figure_path(filename, Some(label.as_str()));
            debug!("Plotting completeness for {label}");
            panels.render(&path, self.plot.completeness_size)?;
            test_set.add_figure(
                filename,
                format!("Photometric detections {label}"),
                Some(label.as_str()),
                None,
            );
        }

        Ok(test_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossing_between_first_bins() {
        let qa = CompletenessQa::new(22.0, 26.0).unwrap();
        let depth = qa
            .limiting_mag(&[20.0, 20.0, 20.0, 21.0, 21.0], &[21.0, 21.0, 21.0, 22.0, 22.0])
            .unwrap();
        let mag = depth.magnitude.unwrap();
        assert!(mag > 20.25 && mag < 21.25);
        assert!((mag - (20.25 + 0.5 / 0.6)).abs() < 1e-9);
        assert!(depth.fit.is_none());
    }

    #[test]
    fn test_empty_sensor_depth_is_undefined() {
        let qa = CompletenessQa::new(22.0, 26.0).unwrap();
        let depth = qa.limiting_mag(&[], &[]).unwrap();
        assert_eq!(depth.magnitude, None);
        assert_eq!(depth.magnitude_or_sentinel(), 0.0);
        assert!(!depth.is_defined());
    }

    #[test]
    fn test_detection_curve_skips_empty_bins() {
        let qa = CompletenessQa::new(22.0, 26.0).unwrap();
        let curve = qa.detection_curve(&[15.1, 15.2], &[24.9]);
        assert_eq!(curve.x, vec![15.25, 24.75]);
        assert_eq!(curve.y, vec![1.0, 0.0]);
    }

    #[derive(Debug)]
    struct FailingFitter;

    impl DepthFitter for FailingFitter {
        fn fit(
            &self,
            _x: &[f64],
            _y: &[f64],
            _dy: &[f64],
            _start: (f64, f64),
        ) -> std::result::Result<ArctanFit, FitError> {
            Err(FitError::Singular)
        }
    }

    #[test]
    fn test_fit_failure_falls_back_to_interpolation() {
        let qa = CompletenessQa::new(22.0, 26.0)
            .unwrap()
            .with_fitter(Box::new(FailingFitter));
        let depth = qa
            .limiting_mag(&[20.0, 20.0, 20.0, 21.0, 21.0], &[21.0, 21.0, 21.0, 22.0, 22.0])
            .unwrap();
        assert!((depth.magnitude.unwrap() - 21.083_333_333_333_332).abs() < 1e-9);
        assert!(depth.fit.is_none());
    }

    #[test]
    fn test_fit_weights_drop_zero_error_bins() {
        #[derive(Debug)]
        struct Recorder;
        impl DepthFitter for Recorder {
            fn fit(
                &self,
                x: &[f64],
                _y: &[f64],
                dy: &[f64],
                start: (f64, f64),
            ) -> std::result::Result<ArctanFit, FitError> {
                // The bin with no matched stars has zero uncertainty
                assert_eq!(x, &[20.25, 21.25]);
                assert!(dy.iter().all(|&e| e > 0.0));
                assert_eq!(start.0, 1.0);
                Ok(ArctanFit {
                    a: 1.0,
                    b: start.1,
                    chi2: 0.0,
                    iterations: 1,
                })
            }
        }

        let qa = CompletenessQa::new(22.0, 26.0)
            .unwrap()
            .with_fitter(Box::new(Recorder));
        let depth = qa
            .limiting_mag(&[20.0, 20.0, 20.0, 21.0, 21.0], &[21.0, 21.0, 21.0, 22.0, 22.0])
            .unwrap();
        let fit = depth.fit.unwrap();
        assert!((depth.magnitude.unwrap() - 21.083_333_333_333_332).abs() < 1e-9);
        assert!((fit.crossing() - depth.magnitude.unwrap()).abs() < 1e-12);
    }
}
