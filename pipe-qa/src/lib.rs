//! Pipeline quality-assessment analyses for focal-plane mosaic cameras.
//!
//! Two analyses run over the per-sensor catalogs of one visit:
//!
//! - [`analysis::CompletenessQa`] measures the magnitude where star detection
//!   completeness drops below 50%, by interpolating the matched/total ratio or,
//!   when a [`fit::DepthFitter`] is supplied, by fitting an arctan model.
//! - [`analysis::PsfEllipticityQa`] reduces per-source second moments to a
//!   median PSF ellipticity and orientation per sensor.
//!
//! Both follow the same shape: `test()` pulls data through the
//! [`data::QaData`] trait, computes per-sensor statistics and records pass/fail
//! [`testset::QaTest`]s; `plot()` renders focal-plane and per-sensor figures
//! into the [`testset::TestSet`] output directory.

use shared::algo::InterpError;
use shared::SensorKey;
use thiserror::Error;

pub mod analysis;
pub mod config;
pub mod data;
pub mod fit;
pub mod json_data;
pub mod testset;

pub use analysis::{CompletenessQa, PsfEllipticityQa};
pub use config::QaConfig;
pub use data::{DataId, FluxType, QaData};
pub use testset::{Outcome, QaTest, TestSet};

/// Errors raised while assembling data, computing statistics or reporting.
#[derive(Debug, Error)]
pub enum QaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown visit '{0}'")]
    UnknownVisit(String),

    /// A match refers to a record that is not in the sensor's catalog.
    #[error("Sensor {sensor}: no {kind} with id {id}")]
    MissingRecord {
        sensor: SensorKey,
        kind: &'static str,
        id: u64,
    },

    #[error("Interpolation error: {0}")]
    Interp(#[from] InterpError),

    #[error(transparent)]
    Viz(#[from] viz::VizError),
}

pub type Result<T> = std::result::Result<T, QaError>;
