//! Raw dataset access.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{GstError, Result};
use crate::io::shape_from_geojson;
use crate::models::{Category, Record, Resolution};

pub trait DatasetProvider: Send + Sync {
    /// Every record of `category` at `resolution`, in dataset order.
    fn records(&self, category: Category, resolution: Resolution) -> Result<Vec<Record>>;
}

/// Reads `<root>/<category>_<resolution>.geojson` feature collections.
#[derive(Debug, Clone)]
pub struct GeoJsonProvider {
    root: PathBuf,
}

impl GeoJsonProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, category: Category, resolution: Resolution) -> PathBuf {
        self.root.join(format!("{category}_{resolution}.geojson"))
    }
}

fn malformed(path: &Path, detail: impl Into<String>) -> GstError {
    GstError::MalformedDataset {
        path: path.to_path_buf(),
        detail: detail.into(),
    }
}

impl DatasetProvider for GeoJsonProvider {
    fn records(&self, category: Category, resolution: Resolution) -> Result<Vec<Record>> {
        let path = self.path(category, resolution);
        let text = fs::read_to_string(&path).map_err(GstError::io(&path))?;
        let document: Value = serde_json::from_str(&text)
            .map_err(|err| malformed(&path, err.to_string()))?;
        let features = document
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed(&path, "not a FeatureCollection"))?;

        let mut records = Vec::with_capacity(features.len());
        for (index, feature) in features.iter().enumerate() {
            let geometry = match feature.get("geometry") {
                Some(Value::Null) | None => {
                    tracing::warn!(path = %path.display(), index, "skipping feature without geometry");
                    continue;
                }
                Some(geometry) => geometry,
            };
            let shape = match shape_from_geojson(geometry) {
                Ok(shape) => shape,
                Err(GstError::MalformedGeoJson(detail)) => {
                    return Err(malformed(&path, format!("feature {index}: {detail}")))
                }
                Err(err) => return Err(err),
            };
            let attributes = feature
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            records.push(Record { shape, attributes });
        }

        tracing::debug!(path = %path.display(), count = records.len(), "loaded dataset");
        Ok(records)
    }
}

/// Records held in memory, served for every resolution.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    records: BTreeMap<Category, Vec<Record>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, category: Category, records: Vec<Record>) -> Self {
        self.records.entry(category).or_default().extend(records);
        self
    }
}

impl DatasetProvider for MemoryProvider {
    fn records(&self, category: Category, _resolution: Resolution) -> Result<Vec<Record>> {
        Ok(self.records.get(&category).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Shape;

    #[test]
    fn reads_feature_collections() {
        let dir = tempfile::tempdir().unwrap();
        let provider = GeoJsonProvider::new(dir.path());
        let body = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "featurecla": "Land" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                    }
                },
                { "type": "Feature", "properties": {}, "geometry": null }
            ]
        });
        fs::write(
            provider.path(Category::Land, Resolution::Crude),
            body.to_string(),
        )
        .unwrap();

        let records = provider.records(Category::Land, Resolution::Crude).unwrap();
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0].shape, Shape::Polygon(_)));
        assert_eq!(records[0].attribute_str("featurecla"), Some("Land"));
    }

    #[test]
    fn names_files_by_category_and_tier() {
        let provider = GeoJsonProvider::new("/data");
        assert_eq!(
            provider.path(Category::RiversLakeCenterlines, Resolution::Full),
            Path::new("/data/rivers_lake_centerlines_f.geojson")
        );
    }

    #[test]
    fn rejects_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let provider = GeoJsonProvider::new(dir.path());
        fs::write(provider.path(Category::Land, Resolution::Low), "{\"type\": 1}").unwrap();
        assert!(matches!(
            provider.records(Category::Land, Resolution::Low),
            Err(GstError::MalformedDataset { .. })
        ));
        assert!(matches!(
            provider.records(Category::Land, Resolution::High),
            Err(GstError::Io { .. })
        ));
    }

    #[test]
    fn memory_provider_serves_every_tier() {
        let provider = MemoryProvider::new()
            .with_records(Category::Land, vec![Record::new(Shape::empty_polygonal())]);
        assert_eq!(provider.records(Category::Land, Resolution::Full).unwrap().len(), 1);
        assert!(provider
            .records(Category::MinorIslands, Resolution::Crude)
            .unwrap()
            .is_empty());
    }
}
