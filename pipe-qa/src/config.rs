//! Analysis configuration, stored as JSON.

use crate::data::FluxType;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the completeness analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletenessConfig {
    /// Acceptable `[min, max]` photometric depth
    pub mag_limits: [f64; 2],
    /// First bin edge
    pub bin_start: f64,
    /// Bin edges stop strictly below this value
    pub bin_stop: f64,
    pub bin_width: f64,
    pub flux_type: FluxType,
    /// Refine the depth with an arctan model fit
    pub use_fitter: bool,
}

impl Default for CompletenessConfig {
    fn default() -> Self {
        Self {
            mag_limits: [22.0, 26.0],
            bin_start: 14.0,
            bin_stop: 27.0,
            bin_width: 0.5,
            flux_type: FluxType::Psf,
            use_fitter: false,
        }
    }
}

/// Settings for the PSF ellipticity analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EllipticityConfig {
    /// Acceptable `[min, max]` median ellipticity
    pub limits: [f64; 2],
    /// Color range of the focal-plane figure
    pub color_limits: [f64; 2],
    /// Whisker length in pixels for unit ellipticity
    pub whisker_scale: f64,
}

impl Default for EllipticityConfig {
    fn default() -> Self {
        Self {
            limits: [0.0, 0.3],
            color_limits: [0.0, 0.1],
            whisker_scale: 1000.0,
        }
    }
}

/// Settings shared by the figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Draw sensors without a value in the undefined color
    pub show_undefined: bool,
    pub fpa_size: (u32, u32),
    pub completeness_size: (u32, u32),
    pub whisker_size: (u32, u32),
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            show_undefined: false,
            fpa_size: (900, 800),
            completeness_size: (800, 1000),
            whisker_size: (400, 400),
        }
    }
}

/// Complete QA configuration.
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    pub completeness: CompletenessConfig,
    pub ellipticity: EllipticityConfig,
    pub plot: PlotConfig,
}

impl QaConfig {
    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QaConfig::default();
        assert_eq!(config.completeness.mag_limits, [22.0, 26.0]);
        assert_eq!(config.completeness.bin_width, 0.5);
        assert_eq!(config.completeness.flux_type, FluxType::Psf);
        assert_eq!(config.ellipticity.limits, [0.0, 0.3]);
        assert_eq!(config.ellipticity.whisker_scale, 1000.0);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: QaConfig =
            serde_json::from_str(r#"{"completeness": {"use_fitter": true, "flux_type": "ap"}}"#)
                .unwrap();
        assert!(config.completeness.use_fitter);
        assert_eq!(config.completeness.flux_type, FluxType::Aperture);
        assert_eq!(config.completeness.mag_limits, [22.0, 26.0]);
        assert_eq!(config.ellipticity, EllipticityConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.json");
        let mut config = QaConfig::default();
        config.completeness.mag_limits = [21.0, 25.5];
        config.plot.show_undefined = true;
        config.save_to_file(&path).unwrap();

        assert_eq!(QaConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(QaConfig::load_from_file(&dir.path().join("absent.json")).is_err());
    }
}
