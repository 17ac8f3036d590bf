//! End-to-end tests running the extract and analyze commands on in-memory
//! extracts.

use super::helpers::{TWO_CELLS, Workspace, town, write_utf8};
use super::*;
use crate::analyze::{AnalyzeConfig, run_analyze_with};
use crate::extract::{ExtractConfig, run_extract_with};
use polyfeat_data::{
    AREA_PROPERTY, IndexPreparationError, MemorySource, UPDATED_PROPERTY, WORLD_STEM, index_path,
};
use rstest::{fixture, rstest};
use serde_json::Value;

#[fixture]
fn workspace() -> Workspace {
    Workspace::new()
}

fn read_features(path: &Utf8Path) -> Vec<Value> {
    let text = std::fs::read_to_string(path).expect("read output");
    let document: Value = serde_json::from_str(&text).expect("valid json");
    document
        .get("features")
        .and_then(Value::as_array)
        .cloned()
        .expect("features array")
}

fn property<'a>(feature: &'a Value, name: &str) -> &'a Value {
    feature
        .get("properties")
        .and_then(|properties| properties.get(name))
        .unwrap_or_else(|| panic!("missing property {name}"))
}

#[rstest]
fn extract_writes_enriched_polygons(workspace: Workspace) {
    let config = workspace.config();
    let report = run_extract_with(&config, &town()).expect("extract succeeds");
    assert_eq!(report.polygons_updated, 2);
    assert_eq!(report.diagnostics.unsupported_geometries, 1);

    let features = read_features(&workspace.output());
    assert_eq!(features.len(), 2);
    let (Some(west), Some(east)) = (features.first(), features.get(1)) else {
        panic!("two features expected");
    };
    assert_eq!(property(west, "name"), "West");
    assert_eq!(property(west, "shop_bakery_count"), 1.0);
    assert_eq!(property(east, "shop_bakery_count"), 0.0);
    assert_eq!(property(east, UPDATED_PROPERTY), true);
    let west_length = property(west, "highway_residential_length")
        .as_f64()
        .expect("numeric length");
    let east_length = property(east, "highway_residential_length")
        .as_f64()
        .expect("numeric length");
    assert!(east_length > west_length && west_length > 0.0);
    assert_eq!(property(west, AREA_PROPERTY), property(east, AREA_PROPERTY));
    assert!(property(west, AREA_PROPERTY).as_f64().is_some_and(|area| area > 0.0));
    assert!(index_path(&workspace.work_dir(), "cells").as_std_path().is_file());
}

#[rstest]
fn extract_without_polygons_aggregates_onto_the_world(workspace: Workspace) {
    let config = ExtractConfig {
        polygons: None,
        ..workspace.config()
    };
    let report = run_extract_with(&config, &town()).expect("extract succeeds");
    assert_eq!(report.polygons_updated, 1);

    let features = read_features(&workspace.output());
    let [world] = features.as_slice() else {
        panic!("one world feature expected, got {}", features.len());
    };
    assert_eq!(world.get("id").and_then(Value::as_str), Some(WORLD_STEM));
    assert_eq!(property(world, "shop_bakery_count"), 1.0);
    assert_eq!(
        property(world, AREA_PROPERTY).as_f64(),
        report.coverage_area_km2
    );
    assert!(index_path(&workspace.work_dir(), WORLD_STEM).as_std_path().is_file());
}

#[rstest]
#[expect(
    clippy::float_arithmetic,
    reason = "comparison uses a relative tolerance"
)]
fn batched_extract_matches_streaming_extract(workspace: Workspace) {
    let streaming = run_extract_with(&workspace.config(), &town()).expect("streaming run");
    let streamed = read_features(&workspace.output());

    let mut config = workspace.config();
    config.options.batching = Some(polyfeat_data::BatchOptions {
        max_nodes_per_cell: 1,
        parallel: true,
    });
    let batched = run_extract_with(&config, &town()).expect("batched run");
    assert!(batched.grid.is_some());
    assert_eq!(streaming.polygons_updated, batched.polygons_updated);

    for (left, right) in streamed.iter().zip(read_features(&workspace.output())) {
        let (Some(want), Some(got)) = (
            property(left, "highway_residential_length").as_f64(),
            property(&right, "highway_residential_length").as_f64(),
        ) else {
            panic!("numeric lengths expected");
        };
        assert!((want - got).abs() <= 1e-6 * want.max(1.0), "{want} vs {got}");
    }
}

#[rstest]
fn changed_polygons_require_an_index_rebuild(workspace: Workspace) {
    run_extract_with(&workspace.config(), &town()).expect("first run builds the index");
    let single = TWO_CELLS.replace(r#""id": "marker""#, r#""id": "extra""#).replace(
        r#"{"type": "Point", "coordinates": [0.005, 0.005]}"#,
        r#"{"type": "Polygon", "coordinates": [[[0,0.01],[0.01,0.01],[0.01,0.02],[0,0.01]]]}"#,
    );
    write_utf8(&workspace.polygons(), single.as_bytes());

    let err = run_extract_with(&workspace.config(), &town()).expect_err("stale index");
    assert!(
        matches!(err, CliError::PrepareIndex(IndexPreparationError::Stale { .. })),
        "{err:?}"
    );
    assert_eq!(err.stage(), "prepare index");

    let rebuild = ExtractConfig {
        rebuild_index: true,
        ..workspace.config()
    };
    let report = run_extract_with(&rebuild, &town()).expect("rebuilt index");
    assert_eq!(report.diagnostics.unsupported_geometries, 0);
}

#[rstest]
fn invalid_polygons_fail_at_loading(workspace: Workspace) {
    write_utf8(&workspace.polygons(), br#"{"type": "Point", "coordinates": [0, 0]}"#);
    let err = run_extract_with(&workspace.config(), &town()).expect_err("not a collection");
    assert!(matches!(err, CliError::LoadPolygons(_)), "{err:?}");
    assert_eq!(err.stage(), "load polygons");
    assert!(!workspace.output().as_std_path().exists());
}

#[rstest]
fn analyze_reports_counts_and_grid(workspace: Workspace) {
    let config = AnalyzeConfig {
        osm_pbf: workspace.osm(),
        max_nodes_per_cell: 1,
    };
    let mut buffer = Vec::new();
    let report = run_analyze_with(&config, &town(), &mut buffer).expect("analysis succeeds");
    assert_eq!(report.profile.nodes, 3);
    let text = String::from_utf8(buffer).expect("utf-8 report");
    assert!(text.contains("nodes: 3"), "{text}");
    assert!(text.contains("ways: 1"), "{text}");
    assert!(text.contains("grid: 2 x 2 cells"), "{text}");
    assert!(text.ends_with('\n'));

    let mut empty = Vec::new();
    run_analyze_with(&config, &MemorySource::new("empty"), &mut empty).expect("empty source");
    let text = String::from_utf8(empty).expect("utf-8 report");
    assert!(text.contains("grid: none"), "{text}");
}
