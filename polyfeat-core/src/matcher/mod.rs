//! Spatial matcher: turns resolved objects into polygon contributions.
//!
//! For each object the matcher queries the index for candidate polygons,
//! confirms the exact relation with the [`GeometryEngine`] and adds the
//! measured contribution through an [`Accumulator`]. Per-object failures are
//! recovered locally and recorded in [`Diagnostics`]; nothing here aborts a
//! stream.

use geo::{BoundingRect, LineString, Polygon, Rect};
use log::{debug, warn};

use crate::classify::{ClassifiedNode, ResolvedWay, WayGeometry};
use crate::diagnostics::Diagnostics;
use crate::geometry::{GeometryEngine, TopologicalError};
use crate::index::SpatialIndex;
use crate::polygon::{Accumulator, TargetPolygonSet};
use crate::rules::FeatureId;

/// Matches objects against a fixed target polygon set.
#[derive(Clone, Copy)]
pub struct SpatialMatcher<'a> {
    targets: &'a TargetPolygonSet,
    index: &'a SpatialIndex,
    engine: &'a dyn GeometryEngine,
}

impl std::fmt::Debug for SpatialMatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialMatcher")
            .field("targets", &self.targets.len())
            .field("indexed", &self.index.len())
            .finish_non_exhaustive()
    }
}

/// Sink pairing an accumulator with the diagnostics it reports into.
pub struct MatchSink<'s> {
    /// Destination for contributions.
    pub accumulator: &'s mut dyn Accumulator,
    /// Counters for recovered failures.
    pub diagnostics: &'s mut Diagnostics,
}

impl MatchSink<'_> {
    fn add_all(&mut self, slot: usize, features: &[FeatureId], value: f64) -> bool {
        let mut applied = false;
        for feature in features {
            match self.accumulator.add(slot, *feature, value) {
                Ok(()) => applied = true,
                Err(err) => {
                    debug!("contribution to slot {slot} refused: {err}");
                    self.diagnostics.rejected_contributions += 1;
                }
            }
        }
        applied
    }
}

impl<'a> SpatialMatcher<'a> {
    /// Matcher over `targets`, whose envelopes are held in `index`.
    #[must_use]
    pub const fn new(
        targets: &'a TargetPolygonSet,
        index: &'a SpatialIndex,
        engine: &'a dyn GeometryEngine,
    ) -> Self {
        Self {
            targets,
            index,
            engine,
        }
    }

    /// Count a node once in every polygon that strictly contains it.
    ///
    /// Returns whether any polygon received a contribution.
    pub fn match_node(&self, node: &ClassifiedNode, sink: &mut MatchSink<'_>) -> bool {
        let bbox = Rect::new(node.location.0, node.location.0);
        let mut matched = false;
        for slot in self.index.query(bbox) {
            let Some(target) = self.targets.get(slot) else {
                continue;
            };
            if self.engine.contains_point(&target.geometry, node.location) {
                matched |= sink.add_all(slot, &node.features, 1.0);
            }
        }
        if matched {
            sink.diagnostics.objects_matched += 1;
        }
        matched
    }

    /// Add the length or area of a way's overlap with each candidate.
    ///
    /// Returns whether any polygon received a contribution.
    pub fn match_way(&self, way: &ResolvedWay, sink: &mut MatchSink<'_>) -> bool {
        let matched = match &way.geometry {
            WayGeometry::Line(line) => self.match_line(way, line, sink),
            WayGeometry::Ring(ring) => self.match_ring(way, ring, sink),
        };
        if matched {
            sink.diagnostics.objects_matched += 1;
        }
        matched
    }

    fn candidates(
        &self,
        bbox: Option<Rect<f64>>,
        way: &ResolvedWay,
        sink: &mut MatchSink<'_>,
    ) -> Vec<usize> {
        if let Some(rect) = bbox {
            self.index.query(rect)
        } else {
            debug!("way {} has no extent; skipped", way.id);
            sink.diagnostics.unsupported_geometries += 1;
            Vec::new()
        }
    }

    fn match_line(
        &self,
        way: &ResolvedWay,
        line: &LineString<f64>,
        sink: &mut MatchSink<'_>,
    ) -> bool {
        let candidates = self.candidates(line.bounding_rect(), way, sink);
        let mut matched = false;
        let mut failure = None;
        for slot in candidates.iter().copied() {
            let Some(target) = self.targets.get(slot) else {
                continue;
            };
            match self.engine.intersect_line(line, &target.geometry) {
                Ok(overlap) => {
                    for part in overlap.into_parts() {
                        let length = self.engine.line_length(&part);
                        if part.0.len() < 2 || !is_positive(length) {
                            debug!("way {}: degenerate fragment in slot {slot}", way.id);
                            sink.diagnostics.degenerate_fragments += 1;
                            continue;
                        }
                        matched |= sink.add_all(slot, &way.features, length);
                    }
                }
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        if let Some(err) = failure
            && let Some(slot) = fallback_slot(&candidates, way.id, &err, sink.diagnostics)
        {
            let length = self.engine.line_length(line);
            if is_positive(length) {
                matched |= sink.add_all(slot, &way.features, length);
            } else {
                debug!("way {}: degenerate fallback line in slot {slot}", way.id);
                sink.diagnostics.degenerate_fragments += 1;
            }
        }
        matched
    }

    fn match_ring(
        &self,
        way: &ResolvedWay,
        ring: &Polygon<f64>,
        sink: &mut MatchSink<'_>,
    ) -> bool {
        let candidates = self.candidates(ring.bounding_rect(), way, sink);
        let mut matched = false;
        let mut failure = None;
        for slot in candidates.iter().copied() {
            let Some(target) = self.targets.get(slot) else {
                continue;
            };
            match self.engine.intersect_area(ring, &target.geometry) {
                Ok(overlap) => {
                    let mut contributed = false;
                    for part in overlap.into_parts() {
                        let area = self.engine.polygon_area(&part);
                        if !is_positive(area) {
                            debug!("way {}: degenerate area part in slot {slot}", way.id);
                            sink.diagnostics.degenerate_fragments += 1;
                            continue;
                        }
                        contributed |= sink.add_all(slot, &way.features, area);
                    }
                    if contributed {
                        sink.add_all(slot, &way.companions, 1.0);
                        matched = true;
                    }
                }
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        if let Some(err) = failure
            && let Some(slot) = fallback_slot(&candidates, way.id, &err, sink.diagnostics)
        {
            let area = self.engine.polygon_area(ring);
            if is_positive(area) {
                if sink.add_all(slot, &way.features, area) {
                    sink.add_all(slot, &way.companions, 1.0);
                    matched = true;
                }
            } else {
                debug!("way {}: degenerate fallback ring in slot {slot}", way.id);
                sink.diagnostics.degenerate_fragments += 1;
            }
        }
        matched
    }
}

const fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Sole candidate to receive the object's full geometry after a topological
/// failure, or `None` when the contribution has to be dropped.
fn fallback_slot(
    candidates: &[usize],
    way: i64,
    err: &TopologicalError,
    diagnostics: &mut Diagnostics,
) -> Option<usize> {
    if let [only] = candidates {
        debug!("way {way}: {err}; using full geometry for slot {only}");
        diagnostics.topology_fallbacks += 1;
        Some(*only)
    } else {
        warn!(
            "way {way}: {err}; contribution dropped ({} candidate polygons)",
            candidates.len()
        );
        diagnostics.topology_dropped += 1;
        None
    }
}
