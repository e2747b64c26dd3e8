//! Synthetic data sets for the integration tests

#![allow(dead_code)]

use pipe_qa::data::{CameraInfo, DetectionFlags, RefObject, Source};
use pipe_qa::json_data::{DataFile, JsonDataSource, MatchIds, SensorData, VisitData};
use shared::{SensorArray, SensorKey};
use std::collections::BTreeMap;

pub const VISIT: &str = "85408";
pub const FILTER: &str = "r";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two rafts of 2x1 CCDs
pub fn camera() -> CameraInfo {
    CameraInfo {
        name: "synthetic-cam".to_string(),
        array: SensorArray::grid(2, 1, 2, 1, 40.0, 1.0, (2048, 4096)),
    }
}

pub fn keys() -> Vec<SensorKey> {
    camera().array.keys().cloned().collect()
}

pub fn mag_to_flux(mag: f64) -> f64 {
    10f64.powf(-0.4 * mag)
}

pub fn source(id: u64, flux: f64, flags: DetectionFlags) -> Source {
    Source {
        id,
        psf_flux: flux,
        psf_flux_err: flux.abs().sqrt(),
        ap_flux: flux,
        ap_flux_err: flux.abs().sqrt(),
        flags,
        ixx: 2.0,
        iyy: 2.0,
        ixy: 0.0,
        x_astrom: 100.0 + id as f64,
        y_astrom: 200.0 + id as f64,
    }
}

pub fn shaped_source(id: u64, ixx: f64, iyy: f64, ixy: f64) -> Source {
    Source {
        ixx,
        iyy,
        ixy,
        ..source(id, 1000.0, DetectionFlags::STAR)
    }
}

pub fn reference(id: u64, mag: f64, is_star: bool) -> RefObject {
    RefObject {
        id,
        psf_flux: mag_to_flux(mag),
        mags: BTreeMap::from([(FILTER.to_string(), mag)]),
        is_star,
    }
}

/// Builds one sensor's catalogs with consistent ids.
pub struct SensorBuilder {
    data: SensorData,
    next_id: u64,
}

impl SensorBuilder {
    pub fn new(key: SensorKey) -> Self {
        Self {
            data: SensorData::new(key, FILTER),
            next_id: 1,
        }
    }

    fn id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Reference object detected and matched in the source list.
    pub fn matched(mut self, mag: f64, flags: DetectionFlags) -> Self {
        let ref_id = self.id();
        let source_id = self.id();
        let is_star = flags.contains(DetectionFlags::STAR);
        self.data.ref_objects.push(reference(ref_id, mag, is_star));
        self.data
            .sources
            .push(source(source_id, 1000.0 * mag_to_flux(mag) / mag_to_flux(20.0), flags));
        self.data.source_matches.push(MatchIds {
            ref_id,
            source_id,
            distance: 0.1,
        });
        self
    }

    pub fn matched_stars(mut self, mags: &[f64]) -> Self {
        for &m in mags {
            self = self.matched(m, DetectionFlags::STAR);
        }
        self
    }

    /// Reference object matched only in the object list.
    pub fn object_matched(mut self, mag: f64, flags: DetectionFlags) -> Self {
        let ref_id = self.id();
        let source_id = self.id();
        self.data
            .ref_objects
            .push(reference(ref_id, mag, flags.contains(DetectionFlags::STAR)));
        self.data.sources.push(source(source_id, 500.0, flags));
        self.data.object_matches.push(MatchIds {
            ref_id,
            source_id,
            distance: 0.2,
        });
        self
    }

    /// Reference stars with no detection.
    pub fn missed_stars(mut self, mags: &[f64]) -> Self {
        for &m in mags {
            let id = self.id();
            self.data.ref_objects.push(reference(id, m, true));
        }
        self
    }

    pub fn missed_galaxy(mut self, mag: f64) -> Self {
        let id = self.id();
        self.data.ref_objects.push(reference(id, mag, false));
        self
    }

    /// Detection without a reference object.
    pub fn orphan(mut self, flux: f64) -> Self {
        let id = self.id();
        self.data.sources.push(source(id, flux, DetectionFlags::empty()));
        self
    }

    /// Matched star whose aperture flux differs from its PSF flux.
    pub fn matched_star_with_ap_flux(mut self, mag: f64, ap_flux: f64) -> Self {
        self = self.matched(mag, DetectionFlags::STAR);
        if let Some(source) = self.data.sources.last_mut() {
            source.ap_flux = ap_flux;
        }
        self
    }

    /// Unmatched detection with separate PSF and aperture fluxes.
    pub fn orphan_with_fluxes(mut self, psf_flux: f64, ap_flux: f64) -> Self {
        self = self.orphan(psf_flux);
        if let Some(source) = self.data.sources.last_mut() {
            source.ap_flux = ap_flux;
        }
        self
    }

    pub fn shaped(mut self, ixx: f64, iyy: f64, ixy: f64) -> Self {
        let id = self.id();
        self.data.sources.push(shaped_source(id, ixx, iyy, ixy));
        self
    }

    pub fn build(self) -> SensorData {
        self.data
    }
}

pub fn data_source(sensors: Vec<SensorData>) -> JsonDataSource {
    JsonDataSource::new(DataFile {
        name: "synthetic".to_string(),
        camera: camera(),
        visits: BTreeMap::from([(VISIT.to_string(), VisitData { sensors })]),
    })
}
