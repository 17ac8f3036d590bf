//! Builders and scripted collaborators shared by unit and behaviour tests.

use geo::{LineString, MultiPolygon, Point, Polygon, polygon};

use crate::geometry::{GeoEngine, GeometryEngine, Overlap, TopologicalError};
use crate::polygon::{TargetPolygon, TargetPolygonSet};
use crate::rules::TagRuleTable;
use crate::Tags;

/// Build a tag map from string pairs.
#[must_use]
pub fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

/// Axis-aligned rectangle as a single-part multipolygon.
#[must_use]
pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: min_x, y: min_y),
        (x: max_x, y: min_y),
        (x: max_x, y: max_y),
        (x: min_x, y: max_y),
        (x: min_x, y: min_y),
    ]])
}

/// Target set with zeroed features for `rules`.
#[must_use]
pub fn target_set(rules: &TagRuleTable, polygons: &[(&str, MultiPolygon<f64>)]) -> TargetPolygonSet {
    let slots = polygons
        .iter()
        .map(|(id, geometry)| TargetPolygon::new(*id, geometry.clone(), rules.schema()))
        .collect();
    TargetPolygonSet::new(slots, rules.schema())
}

/// Geometry engine whose intersections always raise [`TopologicalError`];
/// measurements and containment defer to [`GeoEngine`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingTopologyEngine;

impl FailingTopologyEngine {
    fn failure() -> TopologicalError {
        TopologicalError::InvalidTarget {
            reason: "scripted failure".to_owned(),
        }
    }
}

impl GeometryEngine for FailingTopologyEngine {
    fn contains_point(&self, target: &MultiPolygon<f64>, point: Point<f64>) -> bool {
        GeoEngine.contains_point(target, point)
    }

    fn intersect_line(
        &self,
        _line: &LineString<f64>,
        _target: &MultiPolygon<f64>,
    ) -> Result<Overlap<LineString<f64>>, TopologicalError> {
        Err(Self::failure())
    }

    fn intersect_area(
        &self,
        _area: &Polygon<f64>,
        _target: &MultiPolygon<f64>,
    ) -> Result<Overlap<Polygon<f64>>, TopologicalError> {
        Err(Self::failure())
    }

    fn line_length(&self, line: &LineString<f64>) -> f64 {
        GeoEngine.line_length(line)
    }

    fn polygon_area(&self, polygon: &Polygon<f64>) -> f64 {
        GeoEngine.polygon_area(polygon)
    }
}
