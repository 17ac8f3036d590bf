//! Run diagnostics and streaming progress reporting.

use std::fmt;

use log::{debug, info};

/// Per-run counters for skipped, recovered and dropped work.
///
/// Counters are plain sums, so diagnostics from independent workers combine
/// with [`Diagnostics::merge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Nodes read from the source.
    pub nodes_seen: u64,
    /// Ways read from the source.
    pub ways_seen: u64,
    /// Ways with at least one applicable feature.
    pub ways_considered: u64,
    /// Objects that contributed to at least one polygon.
    pub objects_matched: u64,
    /// Ways deferred on the first pass for missing coordinates.
    pub ways_deferred: u64,
    /// Deferred ways completed by the second pass.
    pub ways_resolved: u64,
    /// Ways still unresolved once resolution finished.
    pub ways_dropped: u64,
    /// Intersections that fell back to the object's own geometry.
    pub topology_fallbacks: u64,
    /// Contributions dropped after a topological failure with several
    /// candidate polygons.
    pub topology_dropped: u64,
    /// Zero-length or single-point fragments skipped.
    pub degenerate_fragments: u64,
    /// Geometries of a kind the matcher cannot use.
    pub unsupported_geometries: u64,
    /// Contributions refused by the accumulator.
    pub rejected_contributions: u64,
    /// Batch cells processed.
    pub cells_processed: u64,
    /// Ways spanning several cells reassembled from their parts.
    pub ways_reassembled: u64,
    /// Ways spanning several cells never completed by any cell.
    pub ways_unfinished: u64,
}

impl Diagnostics {
    /// Add every counter of `other`.
    pub const fn merge(&mut self, other: &Self) {
        self.nodes_seen += other.nodes_seen;
        self.ways_seen += other.ways_seen;
        self.ways_considered += other.ways_considered;
        self.objects_matched += other.objects_matched;
        self.ways_deferred += other.ways_deferred;
        self.ways_resolved += other.ways_resolved;
        self.ways_dropped += other.ways_dropped;
        self.topology_fallbacks += other.topology_fallbacks;
        self.topology_dropped += other.topology_dropped;
        self.degenerate_fragments += other.degenerate_fragments;
        self.unsupported_geometries += other.unsupported_geometries;
        self.rejected_contributions += other.rejected_contributions;
        self.cells_processed += other.cells_processed;
        self.ways_reassembled += other.ways_reassembled;
        self.ways_unfinished += other.ways_unfinished;
    }

    /// Share of considered ways deferred on the first pass, in percent.
    #[must_use]
    pub const fn deferred_percentage(&self) -> f64 {
        percentage(self.ways_deferred, self.ways_considered)
    }

    /// Share of considered ways permanently dropped, in percent.
    #[must_use]
    pub const fn unresolved_percentage(&self) -> f64 {
        percentage(self.ways_dropped, self.ways_considered)
    }
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "percentages of element counts, which stay far below 2^52"
)]
const fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes={} ways={} considered={} matched={} deferred={} resolved={} dropped={} \
             (unresolved {:.2}%) topology_fallbacks={} topology_dropped={} degenerate={} \
             unsupported={} rejected={} cells={} reassembled={} unfinished={}",
            self.nodes_seen,
            self.ways_seen,
            self.ways_considered,
            self.objects_matched,
            self.ways_deferred,
            self.ways_resolved,
            self.ways_dropped,
            self.unresolved_percentage(),
            self.topology_fallbacks,
            self.topology_dropped,
            self.degenerate_fragments,
            self.unsupported_geometries,
            self.rejected_contributions,
            self.cells_processed,
            self.ways_reassembled,
            self.ways_unfinished,
        )
    }
}

/// Kind of streamed element reported to a [`ProgressObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Node or dense node.
    Node,
    /// Way.
    Way,
    /// Relation.
    Relation,
}

impl ElementKind {
    const fn plural(self) -> &'static str {
        match self {
            Self::Node => "nodes",
            Self::Way => "ways",
            Self::Relation => "relations",
        }
    }
}

/// Receives one notification per streamed element.
pub trait ProgressObserver {
    /// An element of `kind` was read.
    fn observe(&mut self, kind: ElementKind);

    /// The stream finished.
    fn finish(&mut self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn observe(&mut self, _kind: ElementKind) {}
}

/// Default logging interval of [`LogProgress`].
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

/// Observer logging element counts at a fixed interval.
#[derive(Debug, Clone)]
pub struct LogProgress {
    label: String,
    interval: u64,
    nodes: u64,
    ways: u64,
    relations: u64,
}

impl LogProgress {
    /// Observer tagging its messages with `label` (pass or cell name).
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_interval(label, DEFAULT_PROGRESS_INTERVAL)
    }

    /// Observer logging every `interval` elements of each kind.
    #[must_use]
    pub fn with_interval(label: impl Into<String>, interval: u64) -> Self {
        Self {
            label: label.into(),
            interval: interval.max(1),
            nodes: 0,
            ways: 0,
            relations: 0,
        }
    }

    /// Elements of `kind` observed so far.
    #[must_use]
    pub const fn seen(&self, kind: ElementKind) -> u64 {
        match kind {
            ElementKind::Node => self.nodes,
            ElementKind::Way => self.ways,
            ElementKind::Relation => self.relations,
        }
    }
}

impl ProgressObserver for LogProgress {
    fn observe(&mut self, kind: ElementKind) {
        let counter = match kind {
            ElementKind::Node => &mut self.nodes,
            ElementKind::Way => &mut self.ways,
            ElementKind::Relation => &mut self.relations,
        };
        *counter += 1;
        let seen = *counter;
        if seen == 1 {
            info!("[{}] Processing {}...", self.label, kind.plural());
        } else if seen.is_multiple_of(self.interval) {
            info!("[{}] Processed {seen} {}", self.label, kind.plural());
        }
    }

    fn finish(&mut self) {
        debug!(
            "[{}] stream finished: {} nodes, {} ways, {} relations",
            self.label, self.nodes, self.ways, self.relations
        );
    }
}
