//! Two-pass way resolution.
//!
//! Pass one streams the dataset once, caching node locations in a bounded
//! [`NodeLocationCache`] and matching every object whose geometry can be
//! built immediately. A way referencing a node the cache cannot supply is
//! deferred: its classification is kept and the missing node ids join the
//! pending set, whose coordinates are captured for the rest of the pass.
//! Deferred ways are only completed by pass two, which re-streams the source
//! capturing pending node coordinates. Anything still unresolved is dropped
//! and reported; in [`PassMode::Single`] that is every deferred way.

use std::collections::{HashMap, HashSet};

use geo::Coord;
use log::{debug, info, warn};
use polyfeat_core::{
    Accumulator, ClassifiedWay, CoordinateLookup, CoverageHull, Diagnostics, ElementKind,
    LogProgress, MatchSink, NodeId, ObjectClassifier, ProgressObserver, RawNode, RawWay,
    SpatialMatcher, TagRuleTable, WayId, WayOutcome,
};

use crate::source::{ElementSource, OsmElement, SourceError};

mod cache;

pub use cache::NodeLocationCache;

/// Number of streaming passes used to resolve ways.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PassMode {
    /// Deferred ways are dropped after the first pass.
    Single,
    /// Deferred ways are completed by a second pass.
    #[default]
    Two,
}

/// Counters and node coverage gathered by [`TwoPassResolver::run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverOutcome {
    /// Run counters.
    pub diagnostics: Diagnostics,
    /// Convex hull of every located node seen on pass one.
    pub coverage: CoverageHull,
}

/// Cache first, then coordinates captured for pending nodes.
struct Layered<'a> {
    cache: &'a NodeLocationCache,
    captured: &'a HashMap<NodeId, Coord<f64>>,
}

impl CoordinateLookup for Layered<'_> {
    fn location(&self, id: NodeId) -> Option<Coord<f64>> {
        self.cache
            .location(id)
            .or_else(|| self.captured.get(&id).copied())
    }
}

/// Drives the Ready/Deferred protocol over a replayable source.
pub struct TwoPassResolver<'a> {
    classifier: ObjectClassifier<'a>,
    matcher: SpatialMatcher<'a>,
    cache: NodeLocationCache,
    pending: HashSet<NodeId>,
    captured: HashMap<NodeId, Coord<f64>>,
    incomplete: Vec<ClassifiedWay>,
    coverage: CoverageHull,
    diagnostics: Diagnostics,
}

impl std::fmt::Debug for TwoPassResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoPassResolver")
            .field("cached", &self.cache.len())
            .field("pending", &self.pending.len())
            .field("captured", &self.captured.len())
            .field("incomplete", &self.incomplete.len())
            .finish_non_exhaustive()
    }
}

impl<'a> TwoPassResolver<'a> {
    /// Resolver caching at most `node_cache_capacity` locations on pass one.
    #[must_use]
    pub fn new(
        rules: &'a TagRuleTable,
        matcher: SpatialMatcher<'a>,
        node_cache_capacity: usize,
    ) -> Self {
        Self {
            classifier: ObjectClassifier::new(rules),
            matcher,
            cache: NodeLocationCache::new(node_cache_capacity),
            pending: HashSet::new(),
            captured: HashMap::new(),
            incomplete: Vec::new(),
            coverage: CoverageHull::default(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Run pass one and, in [`PassMode::Two`], pass two, then drop leftovers.
    pub fn run(
        mut self,
        source: &dyn ElementSource,
        mode: PassMode,
        accumulator: &mut dyn Accumulator,
    ) -> Result<ResolverOutcome, SourceError> {
        let name = source.name();
        self.first_pass(
            source,
            accumulator,
            &mut LogProgress::new(format!("{name} pass 1")),
        )?;
        if mode == PassMode::Two && !self.incomplete.is_empty() {
            self.second_pass(
                source,
                accumulator,
                &mut LogProgress::new(format!("{name} pass 2")),
            )?;
        }
        let coverage = std::mem::take(&mut self.coverage);
        Ok(ResolverOutcome {
            diagnostics: self.finish(),
            coverage,
        })
    }

    /// Stream the source once, matching ready objects and deferring the rest.
    pub fn first_pass(
        &mut self,
        source: &dyn ElementSource,
        accumulator: &mut dyn Accumulator,
        progress: &mut dyn ProgressObserver,
    ) -> Result<(), SourceError> {
        source.for_each_element(&mut |element| match element {
            OsmElement::Node(node) => {
                progress.observe(ElementKind::Node);
                self.first_pass_node(&node, accumulator);
            }
            OsmElement::Way(way) => {
                progress.observe(ElementKind::Way);
                self.first_pass_way(&way, accumulator);
            }
            OsmElement::Relation(_) => progress.observe(ElementKind::Relation),
        })?;
        progress.finish();
        if self.diagnostics.ways_deferred > 0 {
            info!(
                "First pass deferred {} of {} ways ({:.2}%) for missing node coordinates",
                self.diagnostics.ways_deferred,
                self.diagnostics.ways_considered,
                self.diagnostics.deferred_percentage()
            );
        }
        Ok(())
    }

    /// Stream the source again, capturing only coordinates of pending nodes,
    /// then complete the deferred ways.
    pub fn second_pass(
        &mut self,
        source: &dyn ElementSource,
        accumulator: &mut dyn Accumulator,
        progress: &mut dyn ProgressObserver,
    ) -> Result<(), SourceError> {
        info!(
            "Second pass: resolving {} ways waiting on {} nodes",
            self.incomplete.len(),
            self.pending.len()
        );
        source.for_each_element(&mut |element| match element {
            OsmElement::Node(node) => {
                progress.observe(ElementKind::Node);
                self.capture_pending(&node);
            }
            OsmElement::Way(_) => progress.observe(ElementKind::Way),
            OsmElement::Relation(_) => progress.observe(ElementKind::Relation),
        })?;
        progress.finish();
        self.resolve_deferred(accumulator);
        Ok(())
    }

    /// Drop every way still incomplete and return the run counters.
    #[must_use]
    pub fn finish(mut self) -> Diagnostics {
        let dropped = std::mem::take(&mut self.incomplete);
        for way in &dropped {
            debug!("way {} dropped with unresolved node coordinates", way.id);
        }
        self.diagnostics.ways_dropped += u64::try_from(dropped.len()).unwrap_or(u64::MAX);
        if !dropped.is_empty() {
            warn!(
                "{} ways ({:.2}% of considered ways) dropped with unresolved node coordinates",
                dropped.len(),
                self.diagnostics.unresolved_percentage()
            );
        }
        self.diagnostics
    }

    /// Ids of ways currently deferred.
    #[must_use]
    pub fn incomplete(&self) -> Vec<WayId> {
        self.incomplete.iter().map(|way| way.id).collect()
    }

    /// Counters gathered so far.
    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Hull of the located nodes seen so far on pass one.
    #[must_use]
    pub const fn coverage(&self) -> &CoverageHull {
        &self.coverage
    }

    fn first_pass_node(&mut self, node: &RawNode, accumulator: &mut dyn Accumulator) {
        self.diagnostics.nodes_seen += 1;
        if let Some(location) = node.location {
            self.cache.insert(node.id, location);
            self.coverage.observe(location);
        }
        self.capture_pending(node);
        if let Some(classified) = self.classifier.classify_node(node) {
            self.matcher.match_node(
                &classified,
                &mut MatchSink {
                    accumulator,
                    diagnostics: &mut self.diagnostics,
                },
            );
        }
    }

    fn first_pass_way(&mut self, way: &RawWay, accumulator: &mut dyn Accumulator) {
        self.diagnostics.ways_seen += 1;
        let lookup = Layered {
            cache: &self.cache,
            captured: &self.captured,
        };
        let Some(outcome) = self.classifier.classify_and_resolve(way, &lookup) else {
            return;
        };
        self.diagnostics.ways_considered += 1;
        match outcome {
            WayOutcome::Ready(resolved) => {
                self.matcher.match_way(
                    &resolved,
                    &mut MatchSink {
                        accumulator,
                        diagnostics: &mut self.diagnostics,
                    },
                );
            }
            WayOutcome::Deferred { way, signal } => {
                debug!("way {} deferred: {signal}", way.id);
                self.diagnostics.ways_deferred += 1;
                self.pending.extend(signal.missing);
                self.incomplete.push(way);
            }
        }
    }

    fn capture_pending(&mut self, node: &RawNode) {
        if let Some(location) = node.location
            && self.pending.contains(&node.id)
        {
            self.captured.insert(node.id, location);
        }
    }

    /// Retry every deferred way; those still missing coordinates rebuild the
    /// pending set.
    fn resolve_deferred(&mut self, accumulator: &mut dyn Accumulator) {
        let deferred = std::mem::take(&mut self.incomplete);
        let mut pending = HashSet::new();
        for way in deferred {
            let lookup = Layered {
                cache: &self.cache,
                captured: &self.captured,
            };
            match way.resolve(&lookup) {
                Ok(resolved) => {
                    self.diagnostics.ways_resolved += 1;
                    self.matcher.match_way(
                        &resolved,
                        &mut MatchSink {
                            accumulator: &mut *accumulator,
                            diagnostics: &mut self.diagnostics,
                        },
                    );
                }
                Err(signal) => {
                    pending.extend(signal.missing);
                    self.incomplete.push(way);
                }
            }
        }
        self.pending = pending;
    }
}
