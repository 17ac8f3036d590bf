//! Convex hull of the node locations streamed during a run.
//!
//! The hull is kept incrementally: observed coordinates are buffered and
//! folded into the current hull vertices whenever the buffer fills, so
//! memory stays proportional to the hull rather than to the dataset. Hulls
//! of disjoint streams merge by folding one set of vertices into the other.

use geo::{ConvexHull, Coord, LineString, Polygon};

use crate::geometry::{GeoEngine, GeometryEngine};

/// Buffered coordinates folded into the hull at once.
const FOLD_AT: usize = 4_096;

/// Square metres per square kilometre.
const SQUARE_METRES_PER_KM2: f64 = 1.0e6;

/// Incrementally maintained convex hull of observed locations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageHull {
    vertices: Vec<Coord<f64>>,
    buffer: Vec<Coord<f64>>,
}

impl CoverageHull {
    /// Add one location.
    pub fn observe(&mut self, coord: Coord<f64>) {
        self.buffer.push(coord);
        if self.buffer.len() >= FOLD_AT {
            self.fold();
        }
    }

    /// Add every location observed by `other`.
    pub fn merge(&mut self, other: Self) {
        self.buffer.extend(other.vertices);
        self.buffer.extend(other.buffer);
        self.fold();
    }

    /// Whether nothing has been observed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.buffer.is_empty()
    }

    /// Hull of everything observed so far, absent when no location was seen.
    #[must_use]
    pub fn polygon(&self) -> Option<Polygon<f64>> {
        if self.is_empty() {
            return None;
        }
        let points: Vec<Coord<f64>> = self.vertices.iter().chain(&self.buffer).copied().collect();
        Some(LineString::new(points).convex_hull())
    }

    /// Geodesic hull area in square kilometres, absent when the hull
    /// encloses no area (fewer than three non-collinear locations).
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "converting square metres to square kilometres"
    )]
    pub fn area_km2(&self) -> Option<f64> {
        let area = GeoEngine.polygon_area(&self.polygon()?);
        (area.is_finite() && area > 0.0).then(|| area / SQUARE_METRES_PER_KM2)
    }

    fn fold(&mut self) {
        let mut points = std::mem::take(&mut self.vertices);
        points.append(&mut self.buffer);
        if points.is_empty() {
            return;
        }
        self.vertices = LineString::new(points).convex_hull().exterior().0.clone();
    }
}
