//! Bounding-box index over target polygons.
//!
//! Queries return candidate slots whose envelopes intersect the query box.
//! Candidates are a necessary-but-not-sufficient filter: the matcher still
//! asks the geometry engine for the exact relation.

mod persist;

use geo::{BoundingRect, MultiPolygon, Rect};
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

pub use persist::{
    DatasetIdentity, SPATIAL_INDEX_MAGIC, SPATIAL_INDEX_VERSION, SpatialIndexError,
    SpatialIndexWriteError, load_spatial_index, write_spatial_index,
};

/// Envelope of one target polygon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Position of the polygon in its [`crate::TargetPolygonSet`].
    pub slot: usize,
    /// Lower-left corner (`[lon, lat]`).
    pub min: [f64; 2],
    /// Upper-right corner (`[lon, lat]`).
    pub max: [f64; 2],
}

impl IndexEntry {
    /// Entry covering `bbox`.
    #[must_use]
    pub fn new(slot: usize, bbox: Rect<f64>) -> Self {
        Self {
            slot,
            min: [bbox.min().x, bbox.min().y],
            max: [bbox.max().x, bbox.max().y],
        }
    }
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// R\*-tree of polygon envelopes keyed by slot.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    tree: RTree<IndexEntry>,
}

impl SpatialIndex {
    /// Bulk-load an index from prepared entries.
    #[must_use]
    pub fn from_entries(entries: Vec<IndexEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Index every polygon by its bounding box; empty geometries are skipped.
    #[must_use]
    pub fn from_polygons<'a, I>(polygons: I) -> Self
    where
        I: IntoIterator<Item = &'a MultiPolygon<f64>>,
    {
        let entries = polygons
            .into_iter()
            .enumerate()
            .filter_map(|(slot, geometry)| {
                geometry
                    .bounding_rect()
                    .map(|bbox| IndexEntry::new(slot, bbox))
            })
            .collect();
        Self::from_entries(entries)
    }

    /// Add one polygon envelope.
    pub fn insert(&mut self, slot: usize, bbox: Rect<f64>) {
        self.tree.insert(IndexEntry::new(slot, bbox));
    }

    /// Slots whose envelopes intersect `bbox`, boundaries inclusive, in
    /// ascending order.
    #[must_use]
    pub fn query(&self, bbox: Rect<f64>) -> Vec<usize> {
        let envelope =
            AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y]);
        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.slot)
            .collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    /// Number of indexed envelopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// All entries, for persistence.
    #[must_use]
    pub fn entries(&self) -> Vec<IndexEntry> {
        let mut entries: Vec<IndexEntry> = self.tree.iter().copied().collect();
        entries.sort_by_key(|entry| entry.slot);
        entries
    }
}
