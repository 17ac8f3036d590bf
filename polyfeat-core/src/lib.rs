//! Core domain model for the polyfeat extractor.
//!
//! The crate holds everything that decides *what* an OSM object contributes
//! to a target polygon, independent of how objects are streamed:
//!
//! - [`rules`]: the static tag rule table and output column schema.
//! - [`classify`]: raw node/way types and the object classifier.
//! - [`coverage`]: the convex hull of streamed node locations.
//! - [`geometry`]: the geometry engine seam and its `geo`-backed default.
//! - [`index`]: the R\*-tree over polygon envelopes and its on-disk format.
//! - [`polygon`]: target polygons and the additive accumulator.
//! - [`matcher`]: the spatial matcher applying contributions exactly once per
//!   object and polygon.
//! - [`diagnostics`]: run counters and progress reporting.

#![cfg_attr(docsrs, feature(doc_cfg))]

use std::collections::HashMap;

pub mod classify;
pub mod coverage;
pub mod diagnostics;
pub mod geometry;
pub mod index;
pub mod matcher;
pub mod polygon;
pub mod rules;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

/// OpenStreetMap-style key/value tags.
pub type Tags = HashMap<String, String>;

pub use classify::{
    ClassifiedNode, ClassifiedWay, CoordinateLookup, CoordinateUnavailable, NodeId,
    ObjectClassifier, RawNode, RawWay, ResolvedWay, WayGeometry, WayId, WayOutcome,
};
pub use coverage::CoverageHull;
pub use diagnostics::{
    DEFAULT_PROGRESS_INTERVAL, Diagnostics, ElementKind, LogProgress, NoProgress,
    ProgressObserver,
};
pub use geometry::{GeoEngine, GeometryEngine, Overlap, TopologicalError};
pub use index::{
    DatasetIdentity, IndexEntry, SpatialIndex, SpatialIndexError, SpatialIndexWriteError,
    load_spatial_index, write_spatial_index,
};
pub use matcher::{MatchSink, SpatialMatcher};
pub use polygon::{AccumulateError, Accumulator, FeatureDelta, TargetPolygon, TargetPolygonSet};
pub use rules::{
    Category, DEFAULT_RULES, FeatureId, FeatureKind, FeatureSchema, RuleSet, RuleTableError,
    TagRuleTable,
};
