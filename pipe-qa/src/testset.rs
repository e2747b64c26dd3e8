//! Pass/fail test records and the figures that accompany them.
//!
//! A [`TestSet`] collects the tests and figures produced by one analysis for
//! one visit. Figures are rendered straight into the set's output directory;
//! [`TestSet::write_summary`] then records everything in `summary.json`.

use crate::Result;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Result of checking a test value against its limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    /// No value could be measured
    Undefined,
}

/// A measured value with its acceptance range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaTest {
    pub label: String,
    pub value: Option<f64>,
    /// Inclusive `[min, max]` acceptance range
    pub limits: [f64; 2],
    pub comment: String,
    /// Sensor the test applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_label: Option<String>,
}

impl QaTest {
    pub fn new(
        label: impl Into<String>,
        value: Option<f64>,
        limits: [f64; 2],
        comment: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            value,
            limits,
            comment: comment.into(),
            area_label: None,
        }
    }

    pub fn with_area_label(mut self, area_label: impl Into<String>) -> Self {
        self.area_label = Some(area_label.into());
        self
    }

    pub fn evaluate(&self) -> Outcome {
        match self.value {
            Some(v) if v.is_finite() => {
                if v >= self.limits[0] && v <= self.limits[1] {
                    Outcome::Pass
                } else {
                    Outcome::Fail
                }
            }
            _ => Outcome::Undefined,
        }
    }

    pub fn passed(&self) -> bool {
        self.evaluate() == Outcome::Pass
    }
}

/// A figure written alongside the tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureRecord {
    /// Path relative to the test set directory
    pub filename: String,
    pub caption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_label: Option<String>,
    /// Short per-sensor labels, keyed by detector name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nav_map: Option<BTreeMap<String, String>>,
}

/// Counts of test outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub pass: usize,
    pub fail: usize,
    pub undefined: usize,
}

#[derive(Debug, Serialize)]
struct SummaryTest<'a> {
    #[serde(flatten)]
    test: &'a QaTest,
    outcome: Outcome,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    name: &'a str,
    metadata: &'a BTreeMap<String, String>,
    counts: OutcomeCounts,
    tests: Vec<SummaryTest<'a>>,
    figures: &'a [FigureRecord],
}

/// Tests, figures and metadata of one analysis run.
#[derive(Debug, Clone)]
pub struct TestSet {
    name: String,
    output_dir: PathBuf,
    tests: Vec<QaTest>,
    figures: Vec<FigureRecord>,
    metadata: BTreeMap<String, String>,
    /// Subdirectory assigned to each area label
    area_dirs: BTreeMap<String, String>,
}

impl TestSet {
    /// New, empty test set writing into `output_dir`.
    pub fn new(name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            output_dir: output_dir.into(),
            tests: Vec::new(),
            figures: Vec::new(),
            metadata: BTreeMap::new(),
            area_dirs: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn add_test(&mut self, test: QaTest) {
        debug!(
            "[{}] {} = {:?} in {:?}: {:?}",
            self.name,
            test.label,
            test.value,
            test.limits,
            test.evaluate()
        );
        self.tests.push(test);
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl ToString) {
        self.metadata.insert(key.into(), value.to_string());
    }

    /// Where a figure should be rendered.
    ///
    /// Figures tied to a sensor go into a subdirectory named after it, so
    /// per-sensor figures can share a filename. Labels that sanitize to the
    /// same name get numbered subdirectories.
    pub fn figure_path(&mut self, filename: &str, area_label: Option<&str>) -> PathBuf {
        match area_label {
            Some(area) => {
                let dir = self.area_dir(area);
                self.output_dir.join(dir).join(filename)
            }
            None => self.output_dir.join(filename),
        }
    }

    fn area_dir(&mut self, area: &str) -> String {
        if let Some(dir) = self.area_dirs.get(area) {
            return dir.clone();
        }
        let base = sanitize(area);
        let mut dir = base.clone();
        let mut n = 2;
        while self.area_dirs.values().any(|d| *d == dir) {
            dir = format!("{base}_{n}");
            n += 1;
        }
        self.area_dirs.insert(area.to_string(), dir.clone());
        dir
    }

    /// Register a figure that was rendered to [`TestSet::figure_path`].
    pub fn add_figure(
        &mut self,
        filename: &str,
        caption: impl Into<String>,
        area_label: Option<&str>,
        nav_map: Option<BTreeMap<String, String>>,
    ) {
        let relative = match area_label {
            Some(area) => format!("{}/{}", self.area_dir(area), filename),
            None => filename.to_string(),
        };
        self.figures.push(FigureRecord {
            filename: relative,
            caption: caption.into(),
            area_label: area_label.map(str::to_string),
            nav_map,
        });
    }

    pub fn tests(&self) -> &[QaTest] {
        &self.tests
    }

    pub fn figures(&self) -> &[FigureRecord] {
        &self.figures
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for test in &self.tests {
            match test.evaluate() {
                Outcome::Pass => counts.pass += 1,
                Outcome::Fail => counts.fail += 1,
                Outcome::Undefined => counts.undefined += 1,
            }
        }
        counts
    }

    /// Write `summary.json` into the output directory and return its path.
    pub fn write_summary(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let summary = Summary {
            name: &self.name,
            metadata: &self.metadata,
            counts: self.counts(),
            tests: self
                .tests
                .iter()
                .map(|test| SummaryTest {
                    test,
                    outcome: test.evaluate(),
                })
                .collect(),
            figures: &self.figures,
        };
        let path = self.output_dir.join("summary.json");
        std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;

        let counts = summary.counts;
        info!(
            "{}: {} passed, {} failed, {} undefined -> {}",
            self.name,
            counts.pass,
            counts.fail,
            counts.undefined,
            path.display()
        );
        Ok(path)
    }
}

/// Make a label usable as a path component.
fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_whitespace() || c == ':' || c == ',' || c == '/' { '_' } else { c })
        .collect()
}
