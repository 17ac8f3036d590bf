//! In-memory element source for embedding and tests.

use geo::Coord;
use polyfeat_core::{NodeId, RawNode, RawWay, WayId};

use super::{ElementSource, OsmElement, SourceError, collect_tags};

/// Replays a fixed element vector in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySource {
    name: String,
    elements: Vec<OsmElement>,
}

impl MemorySource {
    /// Empty source named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
        }
    }

    /// Append a located node.
    #[must_use]
    pub fn node(self, id: NodeId, lon: f64, lat: f64, tags: &[(&str, &str)]) -> Self {
        self.push(OsmElement::Node(RawNode {
            id,
            location: Some(Coord { x: lon, y: lat }),
            tags: collect_tags(tags.iter().copied()),
        }))
    }

    /// Append a node without a usable location.
    #[must_use]
    pub fn unlocated_node(self, id: NodeId, tags: &[(&str, &str)]) -> Self {
        self.push(OsmElement::Node(RawNode {
            id,
            location: None,
            tags: collect_tags(tags.iter().copied()),
        }))
    }

    /// Append a way.
    #[must_use]
    pub fn way(self, id: WayId, refs: &[NodeId], tags: &[(&str, &str)]) -> Self {
        self.push(OsmElement::Way(RawWay {
            id,
            node_refs: refs.to_vec(),
            tags: collect_tags(tags.iter().copied()),
        }))
    }

    /// Append a relation.
    #[must_use]
    pub fn relation(self, id: i64) -> Self {
        self.push(OsmElement::Relation(id))
    }

    /// Append any element.
    #[must_use]
    pub fn push(mut self, element: OsmElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Elements in stream order.
    #[must_use]
    pub fn elements(&self) -> &[OsmElement] {
        &self.elements
    }

    /// Same elements, streamed in a different order.
    #[must_use]
    pub fn reordered(&self, order: impl FnOnce(&mut Vec<OsmElement>)) -> Self {
        let mut elements = self.elements.clone();
        order(&mut elements);
        Self {
            name: self.name.clone(),
            elements,
        }
    }
}

impl ElementSource for MemorySource {
    fn for_each_element(&self, visit: &mut dyn FnMut(OsmElement)) -> Result<(), SourceError> {
        self.elements.iter().cloned().for_each(visit);
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
