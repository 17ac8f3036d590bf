//! GeoJSON persistence of target polygons.
//!
//! Polygon and MultiPolygon features of a `FeatureCollection` become
//! [`TargetPolygon`]s; other geometry kinds are logged and skipped. Without a
//! polygon file the single [`world_layer`] polygon covers the globe. On write
//! every feature keeps its original geometry and pass-through properties and
//! gains one property per schema column plus `updated`, and `area` when the
//! coverage hull of the streamed nodes is known.

use camino::{Utf8Path, Utf8PathBuf};
use geo::{Coord, MultiPolygon, Rect};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, feature::Id};
use log::{info, warn};
use polyfeat_core::{FeatureSchema, TargetPolygon, TargetPolygonSet};
use serde_json::Value;
use thiserror::Error;

use crate::fs;

/// Property carrying the contribution flag.
pub const UPDATED_PROPERTY: &str = "updated";

/// Property carrying the coverage hull area in square kilometres.
pub const AREA_PROPERTY: &str = "area";

/// Id and dataset stem of the polygon used when no polygon file is given.
pub const WORLD_STEM: &str = "world";

/// Errors raised while loading target polygons.
#[derive(Debug, Error)]
pub enum PolygonLoadError {
    /// The file could not be read.
    #[error("failed to read target polygons from {path}")]
    Read {
        /// Input path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid GeoJSON.
    #[error("failed to parse GeoJSON in {path}")]
    Parse {
        /// Input path.
        path: Utf8PathBuf,
        /// Parser error.
        #[source]
        source: Box<geojson::Error>,
    },
    /// The document is GeoJSON but not a feature collection.
    #[error("{path} is not a GeoJSON FeatureCollection")]
    NotFeatureCollection {
        /// Input path.
        path: Utf8PathBuf,
    },
}

/// Errors raised while writing target polygons.
#[derive(Debug, Error)]
pub enum PolygonWriteError {
    /// Serialisation failed.
    #[error("failed to encode target polygons for {path}")]
    Encode {
        /// Output path.
        path: Utf8PathBuf,
        /// Encoder error.
        #[source]
        source: serde_json::Error,
    },
    /// The file could not be written.
    #[error("failed to write target polygons to {path}")]
    Write {
        /// Output path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Geometry and properties of a loaded feature, kept for output.
#[derive(Debug, Clone, PartialEq)]
struct SourceFeature {
    geometry: geojson::Geometry,
    properties: JsonObject,
}

/// Target polygons together with what is needed to write them back.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonLayer {
    targets: TargetPolygonSet,
    sources: Vec<SourceFeature>,
    skipped: usize,
    coverage_area_km2: Option<f64>,
}

impl PolygonLayer {
    /// Loaded polygons.
    #[must_use]
    pub const fn targets(&self) -> &TargetPolygonSet {
        &self.targets
    }

    /// Loaded polygons, mutably.
    pub const fn targets_mut(&mut self) -> &mut TargetPolygonSet {
        &mut self.targets
    }

    /// Features skipped for an unsupported geometry kind.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Record the coverage hull area written as [`AREA_PROPERTY`] on every
    /// feature.
    pub const fn set_coverage_area(&mut self, area_km2: Option<f64>) {
        self.coverage_area_km2 = area_km2;
    }
}

/// A single polygon named [`WORLD_STEM`] spanning every valid coordinate.
#[must_use]
pub fn world_layer(schema: &FeatureSchema) -> PolygonLayer {
    let globe = Rect::new(Coord { x: -180.0, y: -90.0 }, Coord { x: 180.0, y: 90.0 }).to_polygon();
    let geometry = geojson::Geometry::new(geojson::Value::from(&globe));
    let world = TargetPolygon::new(WORLD_STEM, MultiPolygon::new(vec![globe]), schema);
    PolygonLayer {
        targets: TargetPolygonSet::new(vec![world], schema),
        sources: vec![SourceFeature {
            geometry,
            properties: JsonObject::new(),
        }],
        skipped: 0,
        coverage_area_km2: None,
    }
}

/// Load a `FeatureCollection` of target polygons with every column of
/// `schema` initialised to zero.
pub fn load_polygons(
    path: &Utf8Path,
    schema: &FeatureSchema,
) -> Result<PolygonLayer, PolygonLoadError> {
    let text = fs::read_to_string(path).map_err(|source| PolygonLoadError::Read {
        path: path.to_owned(),
        source,
    })?;
    let document = text
        .parse::<GeoJson>()
        .map_err(|source| PolygonLoadError::Parse {
            path: path.to_owned(),
            source: Box::new(source),
        })?;
    let GeoJson::FeatureCollection(collection) = document else {
        return Err(PolygonLoadError::NotFeatureCollection {
            path: path.to_owned(),
        });
    };
    let layer = from_collection(collection, schema);
    info!(
        "Loaded {} target polygons from {path} ({} skipped)",
        layer.targets.len(),
        layer.skipped
    );
    Ok(layer)
}

fn from_collection(collection: FeatureCollection, schema: &FeatureSchema) -> PolygonLayer {
    let mut polygons = Vec::new();
    let mut sources = Vec::new();
    let mut skipped = 0;
    for (position, feature) in collection.features.into_iter().enumerate() {
        let id = feature_id(feature.id.as_ref(), position);
        let Some(geometry) = feature.geometry else {
            warn!("feature {id} has no geometry; skipped");
            skipped += 1;
            continue;
        };
        let Some(shape) = multi_polygon(&geometry) else {
            warn!(
                "feature {id} has unsupported geometry {}; skipped",
                kind_name(&geometry.value)
            );
            skipped += 1;
            continue;
        };
        polygons.push(TargetPolygon::new(id, shape, schema));
        sources.push(SourceFeature {
            geometry,
            properties: feature.properties.unwrap_or_default(),
        });
    }
    PolygonLayer {
        targets: TargetPolygonSet::new(polygons, schema),
        sources,
        skipped,
        coverage_area_km2: None,
    }
}

fn feature_id(id: Option<&Id>, position: usize) -> String {
    match id {
        Some(Id::String(text)) => text.clone(),
        Some(Id::Number(number)) => number.to_string(),
        None => position.to_string(),
    }
}

const fn kind_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn multi_polygon(geometry: &geojson::Geometry) -> Option<MultiPolygon<f64>> {
    match geo::Geometry::<f64>::try_from(geometry.clone()).ok()? {
        geo::Geometry::Polygon(polygon) => Some(MultiPolygon::new(vec![polygon])),
        geo::Geometry::MultiPolygon(polygons) => Some(polygons),
        _ => None,
    }
}

/// Write `layer` as a `FeatureCollection`, creating parent directories.
pub fn write_polygons(
    path: &Utf8Path,
    layer: &PolygonLayer,
    schema: &FeatureSchema,
) -> Result<(), PolygonWriteError> {
    let collection = to_collection(layer, schema);
    let bytes =
        serde_json::to_vec_pretty(&collection).map_err(|source| PolygonWriteError::Encode {
            path: path.to_owned(),
            source,
        })?;
    fs::write_bytes(path, &bytes).map_err(|source| PolygonWriteError::Write {
        path: path.to_owned(),
        source,
    })?;
    info!(
        "Wrote {} target polygons ({} updated) to {path}",
        layer.targets.len(),
        layer.targets.updated_count()
    );
    Ok(())
}

fn to_collection(layer: &PolygonLayer, schema: &FeatureSchema) -> FeatureCollection {
    let features = layer
        .targets
        .iter()
        .zip(&layer.sources)
        .map(|(polygon, source)| {
            let mut properties = source.properties.clone();
            for (column, name) in schema.columns() {
                properties.insert(name.to_owned(), Value::from(polygon.value(column)));
            }
            properties.insert(UPDATED_PROPERTY.to_owned(), Value::Bool(polygon.updated()));
            if let Some(area) = layer.coverage_area_km2 {
                properties.insert(AREA_PROPERTY.to_owned(), Value::from(area));
            }
            Feature {
                bbox: None,
                geometry: Some(source.geometry.clone()),
                id: Some(Id::String(polygon.id.clone())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Contains;
    use polyfeat_core::{Accumulator, TagRuleTable};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    const COLLECTION: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {
          "type": "Feature",
          "id": "north",
          "properties": {"name": "North", "building_count": 99},
          "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}
        },
        {
          "type": "Feature",
          "id": 42,
          "properties": null,
          "geometry": {"type": "MultiPolygon",
                       "coordinates": [[[[2,0],[3,0],[3,1],[2,1],[2,0]]]]}
        },
        {
          "type": "Feature",
          "properties": {},
          "geometry": {"type": "Point", "coordinates": [0.5, 0.5]}
        },
        {
          "type": "Feature",
          "properties": {},
          "geometry": {"type": "Polygon", "coordinates": [[[4,0],[5,0],[5,1],[4,0]]]}
        }
      ]
    }"#;

    #[fixture]
    fn rules() -> TagRuleTable {
        TagRuleTable::default()
    }

    fn write_input(dir: &TempDir, text: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join("cells.geojson"))
            .expect("utf-8 temp path");
        std::fs::write(&path, text).expect("write input");
        path
    }

    #[rstest]
    fn loads_polygons_and_skips_other_kinds(rules: TagRuleTable) {
        let dir = TempDir::new().expect("temp dir");
        let layer = load_polygons(&write_input(&dir, COLLECTION), rules.schema()).expect("load");

        let ids: Vec<&str> = layer.targets().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["north", "42", "3"]);
        assert_eq!(layer.skipped(), 1);
        let north = layer.targets().get(0).expect("north");
        assert!(north.features().iter().all(|v| *v == 0.0));
        assert!(!north.updated());
    }

    #[rstest]
    #[expect(clippy::indexing_slicing, reason = "output has a known feature count")]
    fn writes_columns_and_pass_through_properties(rules: TagRuleTable) {
        let dir = TempDir::new().expect("temp dir");
        let mut layer =
            load_polygons(&write_input(&dir, COLLECTION), rules.schema()).expect("load");
        let count = rules.schema().id_of("building_count").expect("column");
        layer.targets_mut().add(1, count, 2.0).expect("valid contribution");

        let output = Utf8PathBuf::from_path_buf(dir.path().join("out/result.geojson"))
            .expect("utf-8 temp path");
        write_polygons(&output, &layer, rules.schema()).expect("write");

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&output).expect("read output"))
                .expect("valid json");
        let features = written["features"].as_array().expect("features array");
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["properties"]["name"], "North");
        assert_eq!(features[0]["properties"]["building_count"], 0.0);
        assert_eq!(features[0]["properties"][UPDATED_PROPERTY], false);
        assert_eq!(features[0]["geometry"]["type"], "Polygon");
        assert_eq!(features[1]["id"], "42");
        assert_eq!(features[1]["properties"]["building_count"], 2.0);
        assert_eq!(features[1]["properties"][UPDATED_PROPERTY], true);
    }

    #[rstest]
    #[expect(clippy::indexing_slicing, reason = "output has a known feature count")]
    fn world_layer_covers_the_globe_and_reports_coverage(rules: TagRuleTable) {
        let dir = TempDir::new().expect("temp dir");
        let mut layer = world_layer(rules.schema());
        assert_eq!(layer.targets().len(), 1);
        let world = layer.targets().get(0).expect("world");
        assert_eq!(world.id, WORLD_STEM);
        assert!(world.geometry.contains(&geo::Point::new(151.2, -33.9)));

        layer.set_coverage_area(Some(12.5));
        let output = Utf8PathBuf::from_path_buf(dir.path().join("world.geojson"))
            .expect("utf-8 temp path");
        write_polygons(&output, &layer, rules.schema()).expect("write");
        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&output).expect("read output"))
                .expect("valid json");
        let feature = &written["features"][0];
        assert_eq!(feature["id"], WORLD_STEM);
        assert_eq!(feature["properties"][AREA_PROPERTY], 12.5);
        assert_eq!(feature["geometry"]["type"], "Polygon");
    }

    #[rstest]
    fn area_is_omitted_without_coverage(rules: TagRuleTable) {
        let layer = world_layer(rules.schema());
        let collection = to_collection(&layer, rules.schema());
        let properties = collection
            .features
            .first()
            .and_then(|feature| feature.properties.as_ref())
            .expect("properties");
        assert!(!properties.contains_key(AREA_PROPERTY));
        assert_eq!(properties.get(UPDATED_PROPERTY), Some(&Value::Bool(false)));
    }

    #[rstest]
    #[case(r#"{"type": "Point", "coordinates": [0, 0]}"#)]
    #[case(r#"{"type": "Feature", "properties": {}, "geometry": null}"#)]
    fn non_collections_are_rejected(rules: TagRuleTable, #[case] text: &str) {
        let dir = TempDir::new().expect("temp dir");
        let err = load_polygons(&write_input(&dir, text), rules.schema())
            .expect_err("not a collection");
        assert!(matches!(err, PolygonLoadError::NotFeatureCollection { .. }), "{err:?}");
    }

    #[rstest]
    fn invalid_json_and_missing_files_are_errors(rules: TagRuleTable) {
        let dir = TempDir::new().expect("temp dir");
        let err = load_polygons(&write_input(&dir, "{ nope"), rules.schema())
            .expect_err("invalid json");
        assert!(matches!(err, PolygonLoadError::Parse { .. }), "{err:?}");

        let missing = Utf8PathBuf::from_path_buf(dir.path().join("absent.geojson"))
            .expect("utf-8 temp path");
        let err = load_polygons(&missing, rules.schema()).expect_err("missing file");
        assert!(matches!(err, PolygonLoadError::Read { .. }), "{err:?}");
    }
}
