//! Geometry engine used by the spatial matcher.
//!
//! The engine answers the few questions the matcher needs: point-in-polygon,
//! clipped intersections and geodesic measures. Intersections come back as an
//! [`Overlap`] so callers iterate parts structurally instead of parsing text.

use geo::{
    BooleanOps, ChamberlainDuquetteArea, Contains, Distance, Haversine, LineString,
    MultiLineString, MultiPolygon, Point, Polygon, Validation,
};
use thiserror::Error;

/// Shape of an intersection result.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlap<T> {
    /// The inputs do not overlap.
    Empty,
    /// A single connected part.
    Single(T),
    /// Several disjoint parts, each contributing independently.
    Multi(Vec<T>),
}

impl<T> Overlap<T> {
    /// Build from a list of parts.
    #[must_use]
    pub fn from_parts(mut parts: Vec<T>) -> Self {
        match parts.len() {
            0 => Self::Empty,
            1 => parts.pop().map_or(Self::Empty, Self::Single),
            _ => Self::Multi(parts),
        }
    }

    /// Consume into the list of parts.
    #[must_use]
    pub fn into_parts(self) -> Vec<T> {
        match self {
            Self::Empty => Vec::new(),
            Self::Single(part) => vec![part],
            Self::Multi(parts) => parts,
        }
    }

    /// Whether there is nothing to contribute.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Raised when an intersection cannot be computed for malformed input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologicalError {
    /// The object geometry is invalid (self-intersecting ring, repeated or
    /// non-finite coordinates, too few points).
    #[error("invalid {kind} geometry: {reason}")]
    InvalidObject {
        /// Geometry kind being intersected.
        kind: &'static str,
        /// First validation problem reported.
        reason: String,
    },
    /// The target polygon is invalid.
    #[error("invalid target polygon: {reason}")]
    InvalidTarget {
        /// First validation problem reported.
        reason: String,
    },
}

/// Operations the matcher needs from a geometry backend.
pub trait GeometryEngine: Sync {
    /// Strict point-in-polygon; boundary points are not contained.
    fn contains_point(&self, target: &MultiPolygon<f64>, point: Point<f64>) -> bool;

    /// Parts of `line` inside `target`.
    fn intersect_line(
        &self,
        line: &LineString<f64>,
        target: &MultiPolygon<f64>,
    ) -> Result<Overlap<LineString<f64>>, TopologicalError>;

    /// Parts of `area` inside `target`.
    fn intersect_area(
        &self,
        area: &Polygon<f64>,
        target: &MultiPolygon<f64>,
    ) -> Result<Overlap<Polygon<f64>>, TopologicalError>;

    /// Geodesic length in metres.
    fn line_length(&self, line: &LineString<f64>) -> f64;

    /// Geodesic area in square metres.
    fn polygon_area(&self, polygon: &Polygon<f64>) -> f64;
}

/// [`GeometryEngine`] backed by the `geo` crate, treating coordinates as
/// WGS84 longitude/latitude.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoEngine;

impl GeoEngine {
    fn check_target(target: &MultiPolygon<f64>) -> Result<(), TopologicalError> {
        target
            .check_validation()
            .map_err(|err| TopologicalError::InvalidTarget {
                reason: err.to_string(),
            })
    }
}

impl GeometryEngine for GeoEngine {
    fn contains_point(&self, target: &MultiPolygon<f64>, point: Point<f64>) -> bool {
        target.contains(&point)
    }

    fn intersect_line(
        &self,
        line: &LineString<f64>,
        target: &MultiPolygon<f64>,
    ) -> Result<Overlap<LineString<f64>>, TopologicalError> {
        if let Err(err) = line.check_validation() {
            return Err(TopologicalError::InvalidObject {
                kind: "line",
                reason: err.to_string(),
            });
        }
        Self::check_target(target)?;
        let clipped = target.clip(&MultiLineString::new(vec![line.clone()]), false);
        Ok(Overlap::from_parts(clipped.0))
    }

    fn intersect_area(
        &self,
        area: &Polygon<f64>,
        target: &MultiPolygon<f64>,
    ) -> Result<Overlap<Polygon<f64>>, TopologicalError> {
        if let Err(err) = area.check_validation() {
            return Err(TopologicalError::InvalidObject {
                kind: "area",
                reason: err.to_string(),
            });
        }
        Self::check_target(target)?;
        let shared = area.intersection(target);
        Ok(Overlap::from_parts(shared.0))
    }

    fn line_length(&self, line: &LineString<f64>) -> f64 {
        line.lines()
            .map(|segment| Haversine.distance(Point::from(segment.start), Point::from(segment.end)))
            .sum()
    }

    fn polygon_area(&self, polygon: &Polygon<f64>) -> f64 {
        polygon.chamberlain_duquette_unsigned_area()
    }
}
