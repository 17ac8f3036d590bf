//! Streaming and persistence for the polyfeat extractor.
//!
//! Responsibilities:
//! - Stream OSM elements from PBF files or memory ([`source`]).
//! - Profile a dataset and derive batch grids ([`analyze`], [`batch`]).
//! - Resolve way geometries in one or two passes ([`resolver`]).
//! - Load and save target polygons as GeoJSON ([`polygons`]).
//! - Prepare the persisted spatial index ([`index`]).
//! - Drive a complete run ([`extract`]).
//! - Capability-based file access shared with the CLI ([`fs`]).
//!
//! Boundaries:
//! - Tag rules, geometry and matching live in `polyfeat-core`.
//!
//! Invariants:
//! - Contributions reach the target polygons only through an accumulator,
//!   and each object adds to each polygon at most once.
//! - No global mutable state.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod analyze;
pub mod batch;
pub mod extract;
pub mod fs;
pub mod index;
pub mod polygons;
pub mod resolver;
pub mod source;

pub use analyze::{AnalyzeReport, AxisStats, DatasetProfile, analyze};
pub use batch::{
    BatchOptions, BatchOutcome, DEFAULT_MAX_NODES_PER_CELL, GridPartition, run_batched,
};
pub use extract::{
    DEFAULT_NODE_CACHE_CAPACITY, ExtractError, ExtractOptions, ExtractReport, extract,
};
pub use index::{INDEX_SUFFIX, IndexPreparationError, index_path, prepare_index};
pub use polygons::{
    AREA_PROPERTY, PolygonLayer, PolygonLoadError, PolygonWriteError, UPDATED_PROPERTY,
    WORLD_STEM, load_polygons, world_layer, write_polygons,
};
pub use resolver::{NodeLocationCache, PassMode, ResolverOutcome, TwoPassResolver};
pub use source::{ElementSource, MemorySource, OsmElement, SourceError};

#[cfg(feature = "pbf")]
#[cfg_attr(docsrs, doc(cfg(feature = "pbf")))]
pub use source::OsmPbfSource;
