//! Shared components for the pipeline QA crates.
//!
//! Sensor addressing, per-sensor containers, focal-plane geometry and the
//! small numeric helpers used by more than one analysis.

pub mod algo;
pub mod raft_ccd;
pub mod sensor_array;

pub use raft_ccd::{SensorKey, SensorScalar, SensorVector};
pub use sensor_array::{PositionedSensor, SensorArray, SensorPosition};
