//! End-to-end extraction over a source and a set of target polygons.

use std::fmt;

use log::info;
use polyfeat_core::{
    AccumulateError, Diagnostics, GeometryEngine, SpatialIndex, SpatialMatcher, TagRuleTable,
    TargetPolygonSet,
};
use thiserror::Error;

use crate::batch::{BatchOptions, run_batched};
use crate::resolver::{PassMode, TwoPassResolver};
use crate::source::{ElementSource, SourceError};

/// Default bound on node locations cached during the first pass.
pub const DEFAULT_NODE_CACHE_CAPACITY: usize = 50_000_000;

/// How an extraction streams its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Passes used by the resolver. Ignored in batch mode.
    pub pass_mode: PassMode,
    /// Grid batching, replacing the resolver when set.
    pub batching: Option<BatchOptions>,
    /// First-pass node cache bound. Ignored in batch mode.
    pub node_cache_capacity: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            pass_mode: PassMode::Two,
            batching: None,
            node_cache_capacity: DEFAULT_NODE_CACHE_CAPACITY,
        }
    }
}

/// Errors aborting an extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The source could not be streamed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// Gathered contributions could not be applied to the polygons.
    #[error("failed to apply contributions: {0}")]
    Accumulate(#[from] AccumulateError),
}

/// Outcome of [`extract`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractReport {
    /// Run counters.
    pub diagnostics: Diagnostics,
    /// Polygons that received at least one contribution.
    pub polygons_updated: usize,
    /// Grid shape as `(columns, rows)` when batching was used.
    pub grid: Option<(usize, usize)>,
    /// Area of the convex hull of the streamed node locations, in square
    /// kilometres.
    pub coverage_area_km2: Option<f64>,
}

impl ExtractReport {
    /// Count `skipped` input features as unsupported geometries.
    pub fn record_skipped(&mut self, skipped: usize) {
        self.diagnostics.unsupported_geometries = self
            .diagnostics
            .unsupported_geometries
            .saturating_add(u64::try_from(skipped).unwrap_or(u64::MAX));
    }
}

impl fmt::Display for ExtractReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} polygons updated; {}", self.polygons_updated, self.diagnostics)?;
        if let Some((columns, rows)) = self.grid {
            write!(f, "; grid {columns} x {rows}")?;
        }
        if let Some(area) = self.coverage_area_km2 {
            write!(f, "; coverage {area:.2} km2")?;
        }
        Ok(())
    }
}

/// Stream `source` and add every contribution to `targets`.
///
/// Contributions are gathered in a [`polyfeat_core::FeatureDelta`] and only
/// applied once the source has been read completely, so a failed run leaves
/// `targets` untouched.
pub fn extract(
    source: &dyn ElementSource,
    rules: &TagRuleTable,
    targets: &mut TargetPolygonSet,
    index: &SpatialIndex,
    engine: &dyn GeometryEngine,
    options: &ExtractOptions,
) -> Result<ExtractReport, ExtractError> {
    let (delta, diagnostics, grid, coverage) = {
        let matcher = SpatialMatcher::new(targets, index, engine);
        if let Some(batching) = options.batching {
            let outcome = run_batched(source, rules, targets, matcher, batching)?;
            let grid = outcome
                .partition
                .as_ref()
                .map(|partition| (partition.columns(), partition.rows()));
            (outcome.delta, outcome.diagnostics, grid, outcome.coverage)
        } else {
            let mut delta = targets.delta();
            let outcome = TwoPassResolver::new(rules, matcher, options.node_cache_capacity)
                .run(source, options.pass_mode, &mut delta)?;
            (delta, outcome.diagnostics, None, outcome.coverage)
        }
    };
    targets.merge(delta)?;
    let report = ExtractReport {
        diagnostics,
        polygons_updated: targets.updated_count(),
        grid,
        coverage_area_km2: coverage.area_km2(),
    };
    info!("Extraction of {} finished: {report}", source.name());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use polyfeat_core::GeoEngine;
    use polyfeat_core::test_support::{rectangle, target_set};
    use rstest::{fixture, rstest};
    use geo::polygon;

    struct World {
        rules: TagRuleTable,
        targets: TargetPolygonSet,
        index: SpatialIndex,
    }

    #[fixture]
    fn world() -> World {
        let rules = TagRuleTable::default();
        let targets = target_set(
            &rules,
            &[
                ("west", rectangle(0.0, 0.0, 0.01, 0.01)),
                ("east", rectangle(0.01, 0.0, 0.02, 0.01)),
            ],
        );
        let index = SpatialIndex::from_polygons(targets.geometries());
        World {
            rules,
            targets,
            index,
        }
    }

    fn village() -> MemorySource {
        MemorySource::new("village")
            .node(1, 0.002, 0.005, &[("shop", "bakery")])
            .node(2, 0.004, 0.002, &[])
            .node(3, 0.018, 0.002, &[])
            .way(10, &[2, 3], &[("highway", "residential")])
    }

    fn run(world: &mut World, options: &ExtractOptions) -> ExtractReport {
        extract(
            &village(),
            &world.rules,
            &mut world.targets,
            &world.index,
            &GeoEngine,
            options,
        )
        .expect("memory source")
    }

    #[rstest]
    #[case::two_pass(ExtractOptions::default())]
    #[case::batched(ExtractOptions {
        batching: Some(BatchOptions { max_nodes_per_cell: 1, parallel: false }),
        ..ExtractOptions::default()
    })]
    fn updates_both_polygons(mut world: World, #[case] options: ExtractOptions) {
        let report = run(&mut world, &options);
        assert_eq!(report.polygons_updated, 2);
        assert_eq!(report.grid.is_some(), options.batching.is_some());

        let schema = world.rules.schema();
        let bakeries = schema.id_of("shop_bakery_count").expect("bakery column");
        let length = schema.id_of("highway_residential_length").expect("length column");
        let west = world.targets.get(0).expect("west");
        let east = world.targets.get(1).expect("east");
        assert_eq!(west.value(bakeries), 1.0);
        assert_eq!(east.value(bakeries), 0.0);
        assert!(west.value(length) > 0.0);
        assert!(east.value(length) > west.value(length));
    }

    #[rstest]
    #[case::two_pass(ExtractOptions::default())]
    #[case::batched(ExtractOptions {
        batching: Some(BatchOptions { max_nodes_per_cell: 1, parallel: true }),
        ..ExtractOptions::default()
    })]
    #[expect(
        clippy::float_arithmetic,
        reason = "assertion compares areas with a relative tolerance"
    )]
    fn coverage_area_does_not_depend_on_the_mode(
        mut world: World,
        #[case] options: ExtractOptions,
    ) {
        let report = run(&mut world, &options);
        let area = report.coverage_area_km2.expect("three spread nodes");
        let expected = GeoEngine.polygon_area(&polygon![
            (x: 0.002, y: 0.005),
            (x: 0.004, y: 0.002),
            (x: 0.018, y: 0.002),
            (x: 0.002, y: 0.005),
        ]) / 1.0e6;
        assert!((area - expected).abs() <= 1e-9 * expected, "{area} vs {expected}");
        assert!(report.to_string().contains("km2"));
    }

    #[rstest]
    fn skipped_features_count_as_unsupported(mut world: World) {
        let mut report = run(&mut world, &ExtractOptions::default());
        let before = report.diagnostics.unsupported_geometries;
        report.record_skipped(3);
        assert_eq!(report.diagnostics.unsupported_geometries, before + 3);
        assert!(report.to_string().contains("2 polygons updated"));
    }
}
