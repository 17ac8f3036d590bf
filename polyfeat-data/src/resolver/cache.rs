//! Bounded first-pass node location store.

use std::collections::HashMap;

use geo::Coord;
use polyfeat_core::{CoordinateLookup, NodeId};

/// Node locations cached while streaming, up to a fixed capacity.
///
/// Once full, further nodes are refused. Ways that reference a refused node
/// are deferred rather than resolved against a guess.
#[derive(Debug, Clone, Default)]
pub struct NodeLocationCache {
    capacity: usize,
    locations: HashMap<NodeId, Coord<f64>>,
}

impl NodeLocationCache {
    /// Cache holding at most `capacity` locations.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            locations: HashMap::new(),
        }
    }

    /// Store a location; returns `false` when the cache is full.
    pub fn insert(&mut self, id: NodeId, location: Coord<f64>) -> bool {
        if let Some(slot) = self.locations.get_mut(&id) {
            *slot = location;
            return true;
        }
        if self.locations.len() >= self.capacity {
            return false;
        }
        self.locations.insert(id, location);
        true
    }

    /// Number of cached locations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Whether no further node can be stored.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.locations.len() >= self.capacity
    }
}

impl CoordinateLookup for NodeLocationCache {
    fn location(&self, id: NodeId) -> Option<Coord<f64>> {
        self.locations.get(&id).copied()
    }
}
