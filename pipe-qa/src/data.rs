//! Catalog records and the data-access seam the analyses read through.

use crate::Result;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use shared::{SensorArray, SensorKey};
use std::collections::BTreeMap;
use std::fmt;

bitflags! {
    /// Per-detection measurement flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DetectionFlags: u32 {
        /// Source is too close to the edge of the sensor
        const EDGE = 1 << 0;
        /// Centroid moved during shape measurement
        const SHAPE_SHIFT = 1 << 1;
        /// Shape measurement hit the iteration limit
        const SHAPE_MAXITER = 1 << 2;
        /// Shape measured without weighting
        const SHAPE_UNWEIGHTED = 1 << 3;
        /// Some footprint pixels were interpolated
        const INTERP = 1 << 4;
        /// Central pixel was interpolated
        const INTERP_CENTER = 1 << 5;
        /// Some footprint pixels were saturated
        const SATUR = 1 << 6;
        /// Central pixel was saturated
        const SATUR_CENTER = 1 << 7;
        /// Detected as a negative excursion
        const DETECT_NEGATIVE = 1 << 8;
        /// Classified as a point source
        const STAR = 1 << 9;
        /// Used to build the PSF model
        const PSFSTAR = 1 << 10;
    }
}

impl DetectionFlags {
    /// Flags that make a photometric measurement untrustworthy.
    pub const BAD_CENTER: Self = Self::INTERP_CENTER.union(Self::SATUR_CENTER);
}

/// Which flux measurement a photometric analysis uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FluxType {
    #[default]
    Psf,
    #[value(name = "ap")]
    #[serde(rename = "ap")]
    Aperture,
}

impl fmt::Display for FluxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FluxType::Psf => write!(f, "psf"),
            FluxType::Aperture => write!(f, "ap"),
        }
    }
}

/// A detected source on one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: u64,
    pub psf_flux: f64,
    #[serde(default)]
    pub psf_flux_err: f64,
    #[serde(default)]
    pub ap_flux: f64,
    #[serde(default)]
    pub ap_flux_err: f64,
    #[serde(default)]
    pub flags: DetectionFlags,
    /// Second moment along x
    #[serde(default)]
    pub ixx: f64,
    /// Second moment along y
    #[serde(default)]
    pub iyy: f64,
    /// Cross moment
    #[serde(default)]
    pub ixy: f64,
    /// Astrometric x position in pixels
    #[serde(default)]
    pub x_astrom: f64,
    /// Astrometric y position in pixels
    #[serde(default)]
    pub y_astrom: f64,
}

impl Source {
    pub fn flux(&self, flux_type: FluxType) -> f64 {
        match flux_type {
            FluxType::Psf => self.psf_flux,
            FluxType::Aperture => self.ap_flux,
        }
    }

    pub fn flux_err(&self, flux_type: FluxType) -> f64 {
        match flux_type {
            FluxType::Psf => self.psf_flux_err,
            FluxType::Aperture => self.ap_flux_err,
        }
    }

    pub fn is_star(&self) -> bool {
        self.flags.contains(DetectionFlags::STAR)
    }
}

/// A reference-catalog object expected on a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefObject {
    pub id: u64,
    pub psf_flux: f64,
    /// Catalog magnitude per filter name
    #[serde(default)]
    pub mags: BTreeMap<String, f64>,
    #[serde(default)]
    pub is_star: bool,
}

impl RefObject {
    /// Catalog magnitude in `filter`, NaN when the catalog has none.
    pub fn mag(&self, filter: &str) -> f64 {
        self.mags.get(filter).copied().unwrap_or(f64::NAN)
    }
}

/// A reference object paired with the detection it was matched to.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMatch {
    pub reference: RefObject,
    pub source: Source,
    /// Separation between the two positions
    pub distance: f64,
}

/// Reference set a match list was built against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchReference {
    /// Matched against the deep object catalog
    Object,
    /// Matched against the single-visit source catalog
    Source,
}

/// One sensor of the camera as seen by a visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detector {
    pub key: SensorKey,
    pub name: String,
}

/// Camera identity and focal-plane layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub name: String,
    pub array: SensorArray,
}

impl CameraInfo {
    pub fn detector_name(&self, key: &SensorKey) -> String {
        self.array.detector_name(key)
    }
}

/// Selects the data an analysis runs over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataId {
    pub visit: String,
    /// Restrict to one sensor
    pub sensor: Option<SensorKey>,
}

impl DataId {
    pub fn visit(visit: impl Into<String>) -> Self {
        Self {
            visit: visit.into(),
            sensor: None,
        }
    }

    pub fn with_sensor(mut self, key: SensorKey) -> Self {
        self.sensor = Some(key);
        self
    }

    /// Whether `key` is part of this selection.
    pub fn includes(&self, key: &SensorKey) -> bool {
        self.sensor.as_ref().map_or(true, |s| s == key)
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sensor {
            Some(key) => write!(f, "visit={} sensor={}", self.visit, key),
            None => write!(f, "visit={}", self.visit),
        }
    }
}

pub type BySensor<T> = BTreeMap<SensorKey, T>;

/// Access to the catalogs of a processed data set.
///
/// Every lookup is keyed by a [`DataId`] and returns one entry per selected
/// sensor. Sensors missing from a map simply have no data of that kind.
pub trait QaData {
    /// Name of the data set, recorded as test-set metadata
    fn data_name(&self) -> &str;

    fn camera_info(&self) -> &CameraInfo;

    fn detectors(&self, id: &DataId) -> Result<BySensor<Detector>>;

    /// Filter name per sensor
    fn filters(&self, id: &DataId) -> Result<BySensor<String>>;

    fn match_lists(
        &self,
        id: &DataId,
        reference: MatchReference,
    ) -> Result<BySensor<Vec<SourceMatch>>>;

    fn source_sets(&self, id: &DataId) -> Result<BySensor<Vec<Source>>>;

    fn ref_object_sets(&self, id: &DataId) -> Result<BySensor<Vec<RefObject>>>;
}
