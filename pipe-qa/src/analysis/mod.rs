//! The QA analyses and the run protocol they share.
//!
//! An analysis is driven in two steps. [`QaAnalysis::test`] assembles the
//! per-sensor data, computes statistics and records tests, returning a run
//! object that owns all of it. [`QaAnalysis::plot`] consumes the run, renders
//! its figures and hands back the finished [`TestSet`].

use crate::data::{CameraInfo, DataId, QaData};
use crate::testset::TestSet;
use crate::Result;
use shared::SensorKey;
use std::collections::BTreeMap;
use std::path::Path;

pub mod completeness;
pub mod psf_ellipticity;

pub use completeness::{CompletenessDepth, CompletenessQa, CompletenessRun};
pub use psf_ellipticity::{psf_shape, EllipticityRun, PsfEllipticityQa, PsfShape};

/// Per-run state produced by [`QaAnalysis::test`].
pub trait AnalysisRun {
    fn test_set(&self) -> &TestSet;

    fn into_test_set(self) -> TestSet;
}

pub trait QaAnalysis {
    type Run: AnalysisRun;

    /// Short name, used for the test set and its output directory
    fn name(&self) -> &'static str;

    fn test(&self, data: &dyn QaData, id: &DataId, output_root: &Path) -> Result<Self::Run>;

    fn plot(&self, data: &dyn QaData, run: Self::Run) -> Result<TestSet>;

    /// Fresh test set for one visit, writing under `output_root`.
    fn new_test_set(&self, id: &DataId, output_root: &Path) -> TestSet {
        let name = format!("{}.{}", self.name(), id.visit);
        let dir = output_root.join(&name);
        TestSet::new(name, dir)
    }
}

/// CCD name with whitespace runs replaced by `_`, for labels and filenames.
pub fn ccd_label(ccd: &str) -> String {
    let mut label = String::with_capacity(ccd.len());
    let mut in_space = false;
    for c in ccd.chars() {
        if c.is_whitespace() {
            if !in_space {
                label.push('_');
            }
            in_space = true;
        } else {
            label.push(c);
            in_space = false;
        }
    }
    label
}

/// Re-key a figure's navigation labels by detector name.
pub(crate) fn nav_map_by_name(
    camera: &CameraInfo,
    labels: &BTreeMap<SensorKey, String>,
) -> BTreeMap<String, String> {
    labels
        .iter()
        .map(|(key, label)| (camera.detector_name(key), label.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ccd_label() {
        assert_eq!(ccd_label("S:0,2"), "S:0,2");
        assert_eq!(ccd_label("ccd  00"), "ccd_00");
        assert_eq!(ccd_label("a b\tc"), "a_b_c");
        assert_eq!(ccd_label(" x"), "_x");
    }
}
