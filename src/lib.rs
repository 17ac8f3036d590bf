//! Facade crate for the polyfeat OSM feature extractor.
//!
//! This crate re-exports the core domain types and the extraction pipeline.
//! The PBF reader is available behind the `pbf` feature.

#![forbid(unsafe_code)]

pub use polyfeat_core::{
    Category, CoverageHull, DatasetIdentity, Diagnostics, FeatureKind, FeatureSchema, GeoEngine,
    GeometryEngine, SpatialIndex, TagRuleTable, TargetPolygon, TargetPolygonSet,
};
pub use polyfeat_data::{
    AnalyzeReport, BatchOptions, ElementSource, ExtractError, ExtractOptions, ExtractReport,
    MemorySource, PassMode, PolygonLayer, analyze, extract, load_polygons, prepare_index,
    world_layer, write_polygons,
};

#[cfg(feature = "pbf")]
pub use polyfeat_data::OsmPbfSource;
