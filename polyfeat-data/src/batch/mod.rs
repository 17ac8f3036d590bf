//! Bounded-memory batch processing over a geographic grid.
//!
//! The dataset is profiled once, a [`GridPartition`] is derived from the
//! profile and every cell then streams the whole source, keeping only the
//! nodes it owns. A way whose nodes all fall in one cell is matched there.
//! A way spanning several cells goes through the shared [`BorderLedger`],
//! and whichever cell completes its coordinates matches the whole way,
//! exactly once. A way that never completes contributes nothing and is
//! counted as dropped, as the single-pass resolver does.
//!
//! Cells accumulate into private [`FeatureDelta`]s; the ledger mutex is the
//! only state they share. Nodes are expected before the ways referencing
//! them, as in sorted extracts.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use geo::Coord;
use log::{debug, info, warn};
use polyfeat_core::{
    ClassifiedWay, CoordinateUnavailable, CoverageHull, Diagnostics, ElementKind, FeatureDelta, LogProgress,
    MatchSink, NodeId, ObjectClassifier, ProgressObserver, RawNode, RawWay, ResolvedWay,
    SpatialMatcher, TagRuleTable, TargetPolygonSet,
};
use rayon::prelude::*;

use crate::source::{ElementSource, OsmElement, SourceError};

mod ledger;
mod partition;

pub use ledger::{BorderLedger, WayObservation};
pub use partition::{Cell, GridPartition, MAX_SPLITS, split_count};

/// Default node budget per cell.
pub const DEFAULT_MAX_NODES_PER_CELL: u64 = 5_000_000;

/// Batch mode settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Upper bound on nodes a cell should own.
    pub max_nodes_per_cell: u64,
    /// Process cells on the rayon pool.
    pub parallel: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_nodes_per_cell: DEFAULT_MAX_NODES_PER_CELL,
            parallel: false,
        }
    }
}

/// Contributions and counters gathered by a batched run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Merged contributions of every cell.
    pub delta: FeatureDelta,
    /// Merged counters of every cell.
    pub diagnostics: Diagnostics,
    /// Convex hull of every located node owned by a cell.
    pub coverage: CoverageHull,
    /// Grid used, absent when the dataset had no located nodes.
    pub partition: Option<GridPartition>,
}

/// Stream `source` once per grid cell and gather every contribution.
pub fn run_batched(
    source: &dyn ElementSource,
    rules: &TagRuleTable,
    targets: &TargetPolygonSet,
    matcher: SpatialMatcher<'_>,
    options: BatchOptions,
) -> Result<BatchOutcome, SourceError> {
    let profile = source.profile()?;
    let Some(partition) = GridPartition::from_profile(&profile, options.max_nodes_per_cell)
    else {
        info!("{} has no located nodes; nothing to batch", source.name());
        return Ok(BatchOutcome {
            delta: targets.delta(),
            diagnostics: Diagnostics {
                nodes_seen: profile.nodes,
                ways_seen: profile.ways,
                ..Diagnostics::default()
            },
            coverage: CoverageHull::default(),
            partition: None,
        });
    };
    let outcome = run_cells(source, rules, targets, matcher, &partition, options.parallel)?;
    Ok(BatchOutcome {
        partition: Some(partition),
        ..outcome
    })
}

/// Process every cell of `partition`.
pub fn run_cells(
    source: &dyn ElementSource,
    rules: &TagRuleTable,
    targets: &TargetPolygonSet,
    matcher: SpatialMatcher<'_>,
    partition: &GridPartition,
    parallel: bool,
) -> Result<BatchOutcome, SourceError> {
    let cells = partition.cells();
    info!(
        "Processing {} cells ({} x {}){}",
        cells.len(),
        partition.columns(),
        partition.rows(),
        if parallel { " in parallel" } else { "" }
    );
    let ledger = Mutex::new(BorderLedger::default());
    let context = CellContext {
        source,
        classifier: ObjectClassifier::new(rules),
        matcher,
        targets,
        partition,
        ledger: &ledger,
        total: cells.len(),
    };
    let results: Vec<CellResult> = if parallel {
        cells
            .par_iter()
            .map(|cell| context.process(cell))
            .collect::<Result<_, _>>()?
    } else {
        cells
            .iter()
            .map(|cell| context.process(cell))
            .collect::<Result<_, _>>()?
    };

    let mut delta = targets.delta();
    let mut diagnostics = Diagnostics::default();
    let mut coverage = CoverageHull::default();
    for result in results {
        delta.absorb(result.delta);
        diagnostics.merge(&result.diagnostics);
        coverage.merge(result.coverage);
    }
    let unfinished = ledger
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .unfinished();
    let dropped = u64::try_from(unfinished.len()).unwrap_or(u64::MAX);
    diagnostics.ways_unfinished = dropped;
    diagnostics.ways_dropped += dropped;
    if !unfinished.is_empty() {
        warn!("{dropped} ways spanning cells were never completed and are dropped");
        debug!("unfinished ways: {unfinished:?}");
    }
    Ok(BatchOutcome {
        delta,
        diagnostics,
        coverage,
        partition: None,
    })
}

/// Private output of one cell.
struct CellResult {
    delta: FeatureDelta,
    diagnostics: Diagnostics,
    coverage: CoverageHull,
}

/// Read-only state shared by every cell.
struct CellContext<'a> {
    source: &'a dyn ElementSource,
    classifier: ObjectClassifier<'a>,
    matcher: SpatialMatcher<'a>,
    targets: &'a TargetPolygonSet,
    partition: &'a GridPartition,
    ledger: &'a Mutex<BorderLedger>,
    total: usize,
}

impl CellContext<'_> {
    fn process(&self, cell: &Cell) -> Result<CellResult, SourceError> {
        let mut progress = LogProgress::new(format!(
            "{} cell {}/{}",
            self.source.name(),
            cell.index + 1,
            self.total
        ));
        let mut worker = CellWorker {
            context: self,
            index: cell.index,
            local: HashMap::new(),
            coverage: CoverageHull::default(),
            delta: self.targets.delta(),
            diagnostics: Diagnostics {
                cells_processed: 1,
                ..Diagnostics::default()
            },
        };
        self.source.for_each_element(&mut |element| match element {
            OsmElement::Node(node) => {
                progress.observe(ElementKind::Node);
                worker.node(&node);
            }
            OsmElement::Way(way) => {
                progress.observe(ElementKind::Way);
                worker.way(&way);
            }
            OsmElement::Relation(_) => progress.observe(ElementKind::Relation),
        })?;
        progress.finish();
        Ok(CellResult {
            delta: worker.delta,
            diagnostics: worker.diagnostics,
            coverage: worker.coverage,
        })
    }
}

/// Private working set of one cell.
struct CellWorker<'c, 'a> {
    context: &'c CellContext<'a>,
    index: usize,
    local: HashMap<NodeId, Coord<f64>>,
    coverage: CoverageHull,
    delta: FeatureDelta,
    diagnostics: Diagnostics,
}

impl CellWorker<'_, '_> {
    /// Whole-dataset counters are kept by the first cell only.
    const fn counts_totals(&self) -> bool {
        self.index == 0
    }

    fn node(&mut self, node: &RawNode) {
        if self.counts_totals() {
            self.diagnostics.nodes_seen += 1;
        }
        let Some(location) = node.location else {
            return;
        };
        if self.context.partition.cell_of(location) != Some(self.index) {
            return;
        }
        self.local.insert(node.id, location);
        self.coverage.observe(location);
        if let Some(classified) = self.context.classifier.classify_node(node) {
            self.context.matcher.match_node(
                &classified,
                &mut MatchSink {
                    accumulator: &mut self.delta,
                    diagnostics: &mut self.diagnostics,
                },
            );
        }
    }

    fn way(&mut self, raw: &RawWay) {
        if self.counts_totals() {
            self.diagnostics.ways_seen += 1;
        }
        let Some(way) = self.context.classifier.classify_way(raw) else {
            return;
        };
        if self.counts_totals() {
            self.diagnostics.ways_considered += 1;
        }
        let distinct: HashSet<NodeId> = way.node_refs.iter().copied().collect();
        let known: Vec<(NodeId, Coord<f64>)> = distinct
            .iter()
            .filter_map(|id| self.local.get(id).map(|coord| (*id, *coord)))
            .collect();
        if known.is_empty() {
            return;
        }
        if known.len() == distinct.len() {
            let resolved = way.resolve(&self.local);
            self.match_outcome(&way, resolved);
            return;
        }
        let observation = self
            .context
            .ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe_way(way.id, distinct.len(), known);
        if let WayObservation::Completed(coords) = observation {
            self.diagnostics.ways_reassembled += 1;
            let resolved = way.resolve(&coords);
            self.match_outcome(&way, resolved);
        }
    }

    fn match_outcome(
        &mut self,
        way: &ClassifiedWay,
        outcome: Result<ResolvedWay, CoordinateUnavailable>,
    ) {
        match outcome {
            Ok(resolved) => self.match_resolved(&resolved),
            Err(missing) => warn!("way {}: {missing}", way.id),
        }
    }

    fn match_resolved(&mut self, way: &ResolvedWay) {
        self.context.matcher.match_way(
            way,
            &mut MatchSink {
                accumulator: &mut self.delta,
                diagnostics: &mut self.diagnostics,
            },
        );
    }
}
