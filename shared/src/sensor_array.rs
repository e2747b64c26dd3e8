//! Focal-plane layout of a multi-sensor mosaic camera.
//!
//! Figures that show one cell per sensor need to know where each CCD sits in
//! the focal plane. A [`SensorArray`] stores that placement together with the
//! human-readable detector name used to label test records.

use crate::raft_ccd::SensorKey;
use serde::{Deserialize, Serialize};

/// Position of a sensor center in the focal plane.
///
/// Origin is the array center, X increases to the right, Y increases upward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorPosition {
    /// X offset of sensor center from array origin in millimeters
    pub x_mm: f64,
    /// Y offset of sensor center from array origin in millimeters
    pub y_mm: f64,
}

/// A single CCD with its placement in the array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedSensor {
    pub key: SensorKey,
    /// Display name, e.g. "R:1,1 S:0,2"
    pub name: String,
    pub position: SensorPosition,
    pub width_mm: f64,
    pub height_mm: f64,
    /// Detector extent in pixels along x
    pub width_px: usize,
    /// Detector extent in pixels along y
    pub height_px: usize,
}

impl PositionedSensor {
    /// Axis-aligned bounding box `(min_x, min_y, max_x, max_y)` in millimeters.
    pub fn aabb_mm(&self) -> (f64, f64, f64, f64) {
        let half_w = self.width_mm / 2.0;
        let half_h = self.height_mm / 2.0;
        (
            self.position.x_mm - half_w,
            self.position.y_mm - half_h,
            self.position.x_mm + half_w,
            self.position.y_mm + half_h,
        )
    }
}

/// Mosaic of CCDs in a focal plane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorArray {
    pub sensors: Vec<PositionedSensor>,
}

impl SensorArray {
    pub fn new(sensors: Vec<PositionedSensor>) -> Self {
        Self { sensors }
    }

    /// Regular raft/CCD grid.
    ///
    /// Rafts are laid out `raft_cols x raft_rows`, each holding
    /// `ccd_cols x ccd_rows` square CCDs of side `ccd_size_mm` with
    /// `gap_mm` between neighbouring CCDs (and twice that between rafts).
    /// Keys follow the "R:col,row" / "S:col,row" convention.
    pub fn grid(
        raft_cols: usize,
        raft_rows: usize,
        ccd_cols: usize,
        ccd_rows: usize,
        ccd_size_mm: f64,
        gap_mm: f64,
        pixels: (usize, usize),
    ) -> Self {
        let pitch = ccd_size_mm + gap_mm;
        let raft_w = ccd_cols as f64 * pitch + gap_mm;
        let raft_h = ccd_rows as f64 * pitch + gap_mm;
        let total_w = raft_cols as f64 * raft_w;
        let total_h = raft_rows as f64 * raft_h;
        // Centre of the first CCD in the first raft
        let x0 = gap_mm + ccd_size_mm / 2.0 - total_w / 2.0;
        let y0 = gap_mm + ccd_size_mm / 2.0 - total_h / 2.0;

        let mut sensors = Vec::with_capacity(raft_cols * raft_rows * ccd_cols * ccd_rows);
        for rr in 0..raft_rows {
            for rc in 0..raft_cols {
                let raft = format!("R:{rc},{rr}");
                for sr in 0..ccd_rows {
                    for sc in 0..ccd_cols {
                        let ccd = format!("S:{sc},{sr}");
                        let x_mm = x0 + rc as f64 * raft_w + sc as f64 * pitch;
                        let y_mm = y0 + rr as f64 * raft_h + sr as f64 * pitch;
                        sensors.push(PositionedSensor {
                            name: format!("{raft} {ccd}"),
                            key: SensorKey::new(raft.clone(), ccd),
                            position: SensorPosition { x_mm, y_mm },
                            width_mm: ccd_size_mm,
                            height_mm: ccd_size_mm,
                            width_px: pixels.0,
                            height_px: pixels.1,
                        });
                    }
                }
            }
        }
        Self { sensors }
    }

    pub fn sensor(&self, key: &SensorKey) -> Option<&PositionedSensor> {
        self.sensors.iter().find(|s| &s.key == key)
    }

    /// Human-readable name of a sensor; falls back to the key itself.
    pub fn detector_name(&self, key: &SensorKey) -> String {
        self.sensor(key)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| key.to_string())
    }

    pub fn keys(&self) -> impl Iterator<Item = &SensorKey> {
        self.sensors.iter().map(|s| &s.key)
    }

    /// Combined bounding box of all sensors in millimeters.
    pub fn total_aabb_mm(&self) -> Option<(f64, f64, f64, f64)> {
        if self.sensors.is_empty() {
            return None;
        }

        let aabbs: Vec<_> = self.sensors.iter().map(PositionedSensor::aabb_mm).collect();
        let min_x = aabbs.iter().map(|a| a.0).fold(f64::INFINITY, f64::min);
        let min_y = aabbs.iter().map(|a| a.1).fold(f64::INFINITY, f64::min);
        let max_x = aabbs.iter().map(|a| a.2).fold(f64::NEG_INFINITY, f64::max);
        let max_y = aabbs.iter().map(|a| a.3).fold(f64::NEG_INFINITY, f64::max);

        Some((min_x, min_y, max_x, max_y))
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }
}
