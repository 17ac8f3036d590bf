//! Object classifier turning raw streamed nodes and ways into typed,
//! feature-bearing objects.
//!
//! Node classification is immediate. A way is classified from its tags and
//! node-ref shape, then its geometry is resolved through a
//! [`CoordinateLookup`]. When any referenced coordinate is missing the
//! classifier returns [`WayOutcome::Deferred`] carrying the typed
//! [`CoordinateUnavailable`] signal instead of substituting a default.

use std::collections::HashSet;

use geo::{Coord, LineString, Point, Polygon};
use thiserror::Error;

use crate::Tags;
use crate::rules::{Category, FeatureId, FeatureKind, TagRuleTable};

/// OSM node identifier.
pub type NodeId = i64;

/// OSM way identifier.
pub type WayId = i64;

/// A tagged node as streamed from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    /// Node identifier.
    pub id: NodeId,
    /// Longitude/latitude, or `None` when the source had no valid location.
    pub location: Option<Coord<f64>>,
    /// Raw OSM tags.
    pub tags: Tags,
}

/// A way as streamed from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWay {
    /// Way identifier.
    pub id: WayId,
    /// Ordered node references.
    pub node_refs: Vec<NodeId>,
    /// Raw OSM tags.
    pub tags: Tags,
}

impl RawWay {
    /// Area iff the ring is closed and has at least three distinct nodes.
    #[must_use]
    pub fn category(&self) -> Category {
        let closed = match (self.node_refs.first(), self.node_refs.last()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        };
        if closed && self.node_refs.iter().collect::<HashSet<_>>().len() >= 3 {
            Category::Area
        } else {
            Category::Way
        }
    }
}

/// Referenced node coordinates were not available when a way was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} referenced node coordinate(s) unavailable", missing.len())]
pub struct CoordinateUnavailable {
    /// Node ids lacking a coordinate, in first-reference order.
    pub missing: Vec<NodeId>,
}

/// Source of node coordinates during way resolution.
pub trait CoordinateLookup {
    /// Coordinate for `id`, if known.
    fn location(&self, id: NodeId) -> Option<Coord<f64>>;
}

impl<S: std::hash::BuildHasher> CoordinateLookup for std::collections::HashMap<NodeId, Coord<f64>, S> {
    fn location(&self, id: NodeId) -> Option<Coord<f64>> {
        self.get(&id).copied()
    }
}

/// Node matched to at least one count column.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedNode {
    /// Node identifier.
    pub id: NodeId,
    /// Node position.
    pub location: Point<f64>,
    /// Count columns to increment.
    pub features: Vec<FeatureId>,
}

/// Way matched to at least one length or area column, geometry not yet
/// resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedWay {
    /// Way identifier.
    pub id: WayId,
    /// [`Category::Way`] or [`Category::Area`].
    pub category: Category,
    /// Ordered node references.
    pub node_refs: Vec<NodeId>,
    /// Length or area columns receiving the measured overlap.
    pub features: Vec<FeatureId>,
    /// Count columns bumped once per matched polygon for areas.
    pub companions: Vec<FeatureId>,
}

/// Geometry of a resolved way.
#[derive(Debug, Clone, PartialEq)]
pub enum WayGeometry {
    /// Open line aggregated by length.
    Line(LineString<f64>),
    /// Closed ring aggregated by area.
    Ring(Polygon<f64>),
}

/// A way with concrete geometry, ready for matching.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWay {
    /// Way identifier.
    pub id: WayId,
    /// Line or ring geometry.
    pub geometry: WayGeometry,
    /// Length or area columns.
    pub features: Vec<FeatureId>,
    /// Companion count columns (areas only).
    pub companions: Vec<FeatureId>,
}

impl ClassifiedWay {
    /// Resolve every referenced coordinate, or report which are missing.
    pub fn resolve(
        &self,
        lookup: &dyn CoordinateLookup,
    ) -> Result<ResolvedWay, CoordinateUnavailable> {
        let mut coords = Vec::with_capacity(self.node_refs.len());
        let mut missing: Vec<NodeId> = Vec::new();
        for id in &self.node_refs {
            match lookup.location(*id) {
                Some(coord) => coords.push(coord),
                None if !missing.contains(id) => missing.push(*id),
                None => {}
            }
        }
        if missing.is_empty() {
            Ok(self.with_coords(coords))
        } else {
            Err(CoordinateUnavailable { missing })
        }
    }

    /// Build geometry from coordinates already resolved by the caller.
    #[must_use]
    pub fn with_coords(&self, coords: Vec<Coord<f64>>) -> ResolvedWay {
        let line = LineString::new(coords);
        let geometry = match self.category {
            Category::Area => WayGeometry::Ring(Polygon::new(line, Vec::new())),
            Category::Node | Category::Way => WayGeometry::Line(line),
        };
        ResolvedWay {
            id: self.id,
            geometry,
            features: self.features.clone(),
            companions: self.companions.clone(),
        }
    }
}

/// Result of classifying a way against a coordinate lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum WayOutcome {
    /// All coordinates were known.
    Ready(ResolvedWay),
    /// Some coordinates were missing; retry once they are captured.
    Deferred {
        /// Classification to keep for the retry.
        way: ClassifiedWay,
        /// Missing node ids.
        signal: CoordinateUnavailable,
    },
}

/// Applies the tag rule table to raw objects.
#[derive(Debug, Clone, Copy)]
pub struct ObjectClassifier<'a> {
    rules: &'a TagRuleTable,
}

impl<'a> ObjectClassifier<'a> {
    /// Classifier backed by `rules`.
    #[must_use]
    pub const fn new(rules: &'a TagRuleTable) -> Self {
        Self { rules }
    }

    /// Rule table in use.
    #[must_use]
    pub const fn rules(&self) -> &'a TagRuleTable {
        self.rules
    }

    /// Classify a node; `None` when it has no location or no count column.
    #[must_use]
    pub fn classify_node(&self, node: &RawNode) -> Option<ClassifiedNode> {
        let location = node.location?;
        let features = self
            .rules
            .resolve(Category::Node, &node.tags, FeatureKind::Count);
        if features.is_empty() {
            return None;
        }
        Some(ClassifiedNode {
            id: node.id,
            location: Point::from(location),
            features,
        })
    }

    /// Classify a way's tags; `None` when nothing would be contributed.
    #[must_use]
    pub fn classify_way(&self, way: &RawWay) -> Option<ClassifiedWay> {
        if way.node_refs.len() < 2 {
            return None;
        }
        let category = way.category();
        let kind = match category {
            Category::Area => FeatureKind::Area,
            Category::Node | Category::Way => FeatureKind::Length,
        };
        let mut features = Vec::new();
        let mut companions = Vec::new();
        for classification in self.rules.classify(category, &way.tags) {
            if let Some(column) = self.rules.column(classification.feature, kind) {
                features.push(column);
                if category == Category::Area {
                    companions.extend(self.rules.companion_count(classification.feature));
                }
            }
        }
        if features.is_empty() {
            return None;
        }
        Some(ClassifiedWay {
            id: way.id,
            category,
            node_refs: way.node_refs.clone(),
            features,
            companions,
        })
    }

    /// Classify and resolve a way in one step.
    #[must_use]
    pub fn classify_and_resolve(
        &self,
        way: &RawWay,
        lookup: &dyn CoordinateLookup,
    ) -> Option<WayOutcome> {
        let classified = self.classify_way(way)?;
        Some(match classified.resolve(lookup) {
            Ok(resolved) => WayOutcome::Ready(resolved),
            Err(signal) => WayOutcome::Deferred {
                way: classified,
                signal,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use rstest::{fixture, rstest};

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn way(id: WayId, refs: &[NodeId], pairs: &[(&str, &str)]) -> RawWay {
        RawWay {
            id,
            node_refs: refs.to_vec(),
            tags: tags(pairs),
        }
    }

    #[fixture]
    fn rules() -> TagRuleTable {
        TagRuleTable::default()
    }

    #[fixture]
    fn lookup() -> HashMap<NodeId, Coord<f64>> {
        HashMap::from([
            (1, Coord { x: 0.0, y: 0.0 }),
            (2, Coord { x: 0.001, y: 0.0 }),
            (3, Coord { x: 0.001, y: 0.001 }),
        ])
    }

    #[rstest]
    #[case(&[1, 2, 3, 1], Category::Area)]
    #[case(&[1, 2, 3], Category::Way)]
    #[case(&[1, 2, 1], Category::Way)]
    #[case(&[1, 1], Category::Way)]
    fn closed_ring_with_three_distinct_nodes_is_area(
        #[case] refs: &[NodeId],
        #[case] expected: Category,
    ) {
        assert_eq!(way(1, refs, &[]).category(), expected);
    }

    #[rstest]
    fn node_without_location_is_not_classified(rules: TagRuleTable) {
        let node = RawNode {
            id: 7,
            location: None,
            tags: tags(&[("shop", "bakery")]),
        };
        assert!(ObjectClassifier::new(&rules).classify_node(&node).is_none());
    }

    #[rstest]
    fn node_with_count_feature_is_classified(rules: TagRuleTable) {
        let node = RawNode {
            id: 7,
            location: Some(Coord { x: 1.0, y: 2.0 }),
            tags: tags(&[("shop", "bakery")]),
        };
        let classified = ObjectClassifier::new(&rules)
            .classify_node(&node)
            .expect("bakery counts");
        assert_eq!(classified.features.len(), 1);
        assert_eq!(classified.location, Point::new(1.0, 2.0));
    }

    #[rstest]
    fn building_ring_carries_companion_count(
        rules: TagRuleTable,
        lookup: HashMap<NodeId, Coord<f64>>,
    ) {
        let raw = way(10, &[1, 2, 3, 1], &[("building", "yes")]);
        let outcome = ObjectClassifier::new(&rules)
            .classify_and_resolve(&raw, &lookup)
            .expect("building classified");
        let WayOutcome::Ready(resolved) = outcome else {
            panic!("all coordinates known");
        };
        assert!(matches!(resolved.geometry, WayGeometry::Ring(_)));
        assert_eq!(resolved.companions.len(), 1);
    }

    #[rstest]
    fn missing_coordinates_defer_the_way(rules: TagRuleTable, lookup: HashMap<NodeId, Coord<f64>>) {
        let raw = way(11, &[1, 2, 99, 98, 99], &[("highway", "residential")]);
        let outcome = ObjectClassifier::new(&rules)
            .classify_and_resolve(&raw, &lookup)
            .expect("residential classified");
        let WayOutcome::Deferred { way: deferred, signal } = outcome else {
            panic!("node 99 is unknown");
        };
        assert_eq!(deferred.id, 11);
        assert_eq!(signal.missing, vec![99, 98]);
    }

    #[rstest]
    fn untagged_or_inapplicable_ways_are_skipped(rules: TagRuleTable) {
        let classifier = ObjectClassifier::new(&rules);
        assert!(classifier.classify_way(&way(1, &[1, 2], &[("name", "x")])).is_none());
        assert!(
            classifier
                .classify_way(&way(2, &[1, 2], &[("highway", "bus_stop")]))
                .is_none()
        );
        assert!(
            classifier
                .classify_way(&way(3, &[1], &[("highway", "residential")]))
                .is_none()
        );
    }
}
