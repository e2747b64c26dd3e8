//! Per-sensor data containers for focal-plane-array cameras.
//!
//! A mosaic camera is addressed by (raft, CCD) pairs. Analyses accumulate
//! per-source measurements into a [`SensorVector`] and reduce them to one
//! value per sensor stored in a [`SensorScalar`]. Both containers are built
//! from the full list of known sensors up front, so every sensor has an entry
//! (possibly empty or undefined) before any statistic is computed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies one CCD within one raft of a focal-plane-array camera.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SensorKey {
    /// Parent raft identifier (e.g. "R:1,1")
    pub raft: String,
    /// CCD identifier within the raft (e.g. "S:0,2")
    pub ccd: String,
}

impl SensorKey {
    pub fn new(raft: impl Into<String>, ccd: impl Into<String>) -> Self {
        Self {
            raft: raft.into(),
            ccd: ccd.into(),
        }
    }
}

impl fmt::Display for SensorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.raft, self.ccd)
    }
}

/// Growable per-sensor sequences (magnitudes, ellipticities, positions, ...).
///
/// Looking up a sensor with no data returns an empty slice, never an error.
#[derive(Debug, Clone)]
pub struct SensorVector<T = f64> {
    data: BTreeMap<SensorKey, Vec<T>>,
}

impl<T> Default for SensorVector<T> {
    fn default() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }
}

impl<T> SensorVector<T> {
    /// Create a container with an empty vector for every given sensor.
    pub fn new<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a SensorKey>,
    {
        Self {
            data: keys.into_iter().map(|k| (k.clone(), Vec::new())).collect(),
        }
    }

    /// Append one value to a sensor's vector, creating the entry if needed.
    pub fn append(&mut self, key: &SensorKey, value: T) {
        self.data.entry(key.clone()).or_default().push(value);
    }

    /// Replace a sensor's vector wholesale.
    pub fn set(&mut self, key: &SensorKey, values: Vec<T>) {
        self.data.insert(key.clone(), values);
    }

    /// All values recorded for a sensor; empty when the sensor has none.
    pub fn get(&self, key: &SensorKey) -> &[T] {
        self.data.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sensor keys in (raft, ccd) order.
    pub fn keys(&self) -> impl Iterator<Item = &SensorKey> {
        self.data.keys()
    }

    /// Number of sensors tracked.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of values summed over every sensor.
    pub fn total_count(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }
}

/// One value per sensor; every sensor starts undefined.
#[derive(Debug, Clone)]
pub struct SensorScalar<T> {
    data: BTreeMap<SensorKey, Option<T>>,
}

impl<T> Default for SensorScalar<T> {
    fn default() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }
}

impl<T> SensorScalar<T> {
    /// Create a container holding an undefined value for every given sensor.
    pub fn new<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a SensorKey>,
    {
        Self {
            data: keys.into_iter().map(|k| (k.clone(), None)).collect(),
        }
    }

    pub fn set(&mut self, key: &SensorKey, value: T) {
        self.data.insert(key.clone(), Some(value));
    }

    /// Value for a sensor, `None` if it was never set or the sensor is unknown.
    pub fn get(&self, key: &SensorKey) -> Option<&T> {
        self.data.get(key).and_then(Option::as_ref)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SensorKey> {
        self.data.keys()
    }

    /// Every sensor with its (possibly undefined) value.
    pub fn iter(&self) -> impl Iterator<Item = (&SensorKey, Option<&T>)> {
        self.data.iter().map(|(k, v)| (k, v.as_ref()))
    }

    /// Only the sensors whose value has been set.
    pub fn defined(&self) -> impl Iterator<Item = (&SensorKey, &T)> {
        self.data
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|value| (k, value)))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<SensorKey> {
        vec![
            SensorKey::new("R:1,1", "S:0,0"),
            SensorKey::new("R:1,1", "S:0,1"),
            SensorKey::new("R:2,2", "S:1,1"),
        ]
    }

    #[test]
    fn test_vector_starts_empty_for_every_sensor() {
        let keys = keys();
        let vec: SensorVector = SensorVector::new(&keys);
        assert_eq!(vec.len(), 3);
        for key in &keys {
            assert!(vec.get(key).is_empty());
        }
        assert_eq!(vec.total_count(), 0);
    }

    #[test]
    fn test_vector_append_and_set() {
        let keys = keys();
        let mut vec = SensorVector::new(&keys);
        vec.append(&keys[0], 1.0);
        vec.append(&keys[0], 2.0);
        vec.set(&keys[2], vec![5.0, 6.0, 7.0]);

        assert_eq!(vec.get(&keys[0]), &[1.0, 2.0]);
        assert!(vec.get(&keys[1]).is_empty());
        assert_eq!(vec.get(&keys[2]).len(), 3);
        assert_eq!(vec.total_count(), 5);
    }

    #[test]
    fn test_vector_unknown_sensor_has_no_data() {
        let vec: SensorVector = SensorVector::new(&keys());
        let unknown = SensorKey::new("R:9,9", "S:9,9");
        assert!(vec.get(&unknown).is_empty());
    }

    #[test]
    fn test_scalar_undefined_until_set() {
        let keys = keys();
        let mut depth = SensorScalar::new(&keys);
        assert!(depth.get(&keys[1]).is_none());

        depth.set(&keys[1], 24.5);
        assert_eq!(depth.get(&keys[1]), Some(&24.5));
        assert_eq!(depth.defined().count(), 1);
        assert_eq!(depth.iter().count(), 3);
    }

    #[test]
    fn test_keys_are_ordered() {
        let mut keys = keys();
        keys.reverse();
        let vec: SensorVector = SensorVector::new(&keys);
        let ordered: Vec<_> = vec.keys().cloned().collect();
        assert_eq!(ordered[0], SensorKey::new("R:1,1", "S:0,0"));
        assert_eq!(ordered[2], SensorKey::new("R:2,2", "S:1,1"));
    }

    #[test]
    fn test_sensor_key_display() {
        let key = SensorKey::new("R:1,1", "S:0,2");
        assert_eq!(key.to_string(), "R:1,1 S:0,2");
    }
}
