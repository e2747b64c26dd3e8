//! File-backed [`QaData`] implementation.
//!
//! A data file holds the camera layout plus, per visit, one entry per sensor
//! with its filter, detected sources, reference objects and the two match
//! lists. Matches are stored as id pairs and resolved to full records when a
//! match list is requested.

use crate::data::{
    BySensor, CameraInfo, DataId, Detector, MatchReference, QaData, RefObject, Source,
    SourceMatch,
};
use crate::{QaError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use shared::SensorKey;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// A match stored by id
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchIds {
    pub ref_id: u64,
    pub source_id: u64,
    #[serde(default)]
    pub distance: f64,
}

/// Everything recorded for one sensor in one visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    pub key: SensorKey,
    pub filter: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub ref_objects: Vec<RefObject>,
    /// Matches against the object catalog
    #[serde(default)]
    pub object_matches: Vec<MatchIds>,
    /// Matches against the source catalog
    #[serde(default)]
    pub source_matches: Vec<MatchIds>,
}

impl SensorData {
    pub fn new(key: SensorKey, filter: impl Into<String>) -> Self {
        Self {
            key,
            filter: filter.into(),
            sources: Vec::new(),
            ref_objects: Vec::new(),
            object_matches: Vec::new(),
            source_matches: Vec::new(),
        }
    }

    fn matches(&self, reference: MatchReference) -> &[MatchIds] {
        match reference {
            MatchReference::Object => &self.object_matches,
            MatchReference::Source => &self.source_matches,
        }
    }

    fn resolve(&self, reference: MatchReference) -> Result<Vec<SourceMatch>> {
        let sources: HashMap<u64, &Source> = self.sources.iter().map(|s| (s.id, s)).collect();
        let refs: HashMap<u64, &RefObject> = self.ref_objects.iter().map(|r| (r.id, r)).collect();

        self.matches(reference)
            .iter()
            .map(|m| {
                let reference = refs.get(&m.ref_id).ok_or_else(|| QaError::MissingRecord {
                    sensor: self.key.clone(),
                    kind: "reference object",
                    id: m.ref_id,
                })?;
                let source = sources
                    .get(&m.source_id)
                    .ok_or_else(|| QaError::MissingRecord {
                        sensor: self.key.clone(),
                        kind: "source",
                        id: m.source_id,
                    })?;
                Ok(SourceMatch {
                    reference: (*reference).clone(),
                    source: (*source).clone(),
                    distance: m.distance,
                })
            })
            .collect()
    }
}

/// Sensors observed in one visit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitData {
    pub sensors: Vec<SensorData>,
}

/// On-disk layout of a data set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFile {
    pub name: String,
    pub camera: CameraInfo,
    pub visits: BTreeMap<String, VisitData>,
}

/// [`QaData`] served from a [`DataFile`] held in memory.
#[derive(Debug, Clone)]
pub struct JsonDataSource {
    file: DataFile,
}

impl JsonDataSource {
    pub fn new(file: DataFile) -> Self {
        Self { file }
    }

    /// Load a data set from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let file: DataFile = serde_json::from_str(&json)?;
        debug!(
            "Loaded data set '{}' with {} visit(s) from {}",
            file.name,
            file.visits.len(),
            path.display()
        );
        Ok(Self { file })
    }

    /// Save the data set to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.file)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn file(&self) -> &DataFile {
        &self.file
    }

    /// Visit identifiers in the data set.
    pub fn visits(&self) -> impl Iterator<Item = &str> {
        self.file.visits.keys().map(String::as_str)
    }

    fn sensors<'a>(&'a self, id: &'a DataId) -> Result<impl Iterator<Item = &'a SensorData>> {
        let visit = self
            .file
            .visits
            .get(&id.visit)
            .ok_or_else(|| QaError::UnknownVisit(id.visit.clone()))?;
        Ok(visit.sensors.iter().filter(move |s| id.includes(&s.key)))
    }
}

impl QaData for JsonDataSource {
    fn data_name(&self) -> &str {
        &self.file.name
    }

    fn camera_info(&self) -> &CameraInfo {
        &self.file.camera
    }

    fn detectors(&self, id: &DataId) -> Result<BySensor<Detector>> {
        Ok(self
            .sensors(id)?
            .map(|s| {
                let detector = Detector {
                    key: s.key.clone(),
                    name: self.file.camera.detector_name(&s.key),
                };
                (s.key.clone(), detector)
            })
            .collect())
    }

    fn filters(&self, id: &DataId) -> Result<BySensor<String>> {
        Ok(self
            .sensors(id)?
            .map(|s| (s.key.clone(), s.filter.clone()))
            .collect())
    }

    fn match_lists(
        &self,
        id: &DataId,
        reference: MatchReference,
    ) -> Result<BySensor<Vec<SourceMatch>>> {
        self.sensors(id)?
            .map(|s| Ok((s.key.clone(), s.resolve(reference)?)))
            .collect()
    }

    fn source_sets(&self, id: &DataId) -> Result<BySensor<Vec<Source>>> {
        Ok(self
            .sensors(id)?
            .map(|s| (s.key.clone(), s.sources.clone()))
            .collect())
    }

    fn ref_object_sets(&self, id: &DataId) -> Result<BySensor<Vec<RefObject>>> {
        Ok(self
            .sensors(id)?
            .map(|s| (s.key.clone(), s.ref_objects.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DetectionFlags;
    use shared::SensorArray;

    fn source(id: u64, flux: f64) -> Source {
        Source {
            id,
            psf_flux: flux,
            psf_flux_err: 0.0,
            ap_flux: flux,
            ap_flux_err: 0.0,
            flags: DetectionFlags::STAR,
            ixx: 2.0,
            iyy: 2.0,
            ixy: 0.0,
            x_astrom: 10.0,
            y_astrom: 20.0,
        }
    }

    fn reference(id: u64) -> RefObject {
        RefObject {
            id,
            psf_flux: 1e-8,
            mags: BTreeMap::from([("r".to_string(), 20.0)]),
            is_star: true,
        }
    }

    fn data_file() -> DataFile {
        let array = SensorArray::grid(1, 1, 2, 1, 40.0, 1.0, (2048, 4096));
        let keys: Vec<SensorKey> = array.keys().cloned().collect();

        let mut first = SensorData::new(keys[0].clone(), "r");
        first.sources = vec![source(1, 100.0), source(2, 50.0)];
        first.ref_objects = vec![reference(10), reference(11)];
        first.source_matches = vec![MatchIds {
            ref_id: 10,
            source_id: 1,
            distance: 0.1,
        }];
        let second = SensorData::new(keys[1].clone(), "r");

        DataFile {
            name: "synthetic".to_string(),
            camera: CameraInfo {
                name: "test-cam".to_string(),
                array,
            },
            visits: BTreeMap::from([(
                "1".to_string(),
                VisitData {
                    sensors: vec![first, second],
                },
            )]),
        }
    }

    #[test]
    fn test_lookups_cover_every_sensor() {
        let data = JsonDataSource::new(data_file());
        let id = DataId::visit("1");

        let detectors = data.detectors(&id).unwrap();
        assert_eq!(detectors.len(), 2);
        let first = detectors.values().next().unwrap();
        assert_eq!(first.name, "R:0,0 S:0,0");

        let matches = data.match_lists(&id, MatchReference::Source).unwrap();
        let key = &first.key;
        assert_eq!(matches[key].len(), 1);
        assert_eq!(matches[key][0].reference.id, 10);
        assert_eq!(matches[key][0].source.id, 1);

        let object_matches = data.match_lists(&id, MatchReference::Object).unwrap();
        assert!(object_matches[key].is_empty());
        assert_eq!(data.source_sets(&id).unwrap()[key].len(), 2);
    }

    #[test]
    fn test_sensor_restriction() {
        let data = JsonDataSource::new(data_file());
        let key = data.camera_info().array.keys().nth(1).unwrap().clone();
        let id = DataId::visit("1").with_sensor(key.clone());
        let filters = data.filters(&id).unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[&key], "r");
    }

    #[test]
    fn test_unknown_visit() {
        let data = JsonDataSource::new(data_file());
        assert!(matches!(
            data.detectors(&DataId::visit("99")),
            Err(QaError::UnknownVisit(v)) if v == "99"
        ));
    }

    #[test]
    fn test_dangling_match_id() {
        let mut file = data_file();
        file.visits.get_mut("1").unwrap().sensors[0]
            .source_matches
            .push(MatchIds {
                ref_id: 10,
                source_id: 404,
                distance: 0.0,
            });
        let data = JsonDataSource::new(file);
        let err = data
            .match_lists(&DataId::visit("1"), MatchReference::Source)
            .unwrap_err();
        assert!(matches!(err, QaError::MissingRecord { id: 404, .. }));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let data = JsonDataSource::new(data_file());
        data.save_to_file(&path).unwrap();

        let loaded = JsonDataSource::load_from_file(&path).unwrap();
        assert_eq!(loaded.file(), data.file());
        assert_eq!(loaded.visits().collect::<Vec<_>>(), vec!["1"]);
    }
}
