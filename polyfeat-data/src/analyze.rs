//! Streaming dataset statistics.
//!
//! [`DatasetProfile`] is computed in one constant-memory pass: element
//! counts, the bounding box and per-axis running mean and variance (Welford).
//! Profiles of disjoint element streams merge with Chan's parallel
//! combination, so the PBF reader can fold blocks in parallel.

use std::fmt;

use geo::{Coord, Rect};

use crate::batch::GridPartition;
use crate::source::{ElementSource, OsmElement, SourceError};

#[expect(
    clippy::cast_precision_loss,
    reason = "element counts stay far below 2^52"
)]
const fn as_f64(count: u64) -> f64 {
    count as f64
}

/// Running mean and variance of one coordinate axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl AxisStats {
    /// Fold one observation in.
    #[expect(
        clippy::float_arithmetic,
        reason = "Welford update of the running mean and variance"
    )]
    pub const fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / as_f64(self.count);
        self.m2 += delta * (value - self.mean);
    }

    /// Statistics of both samples.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "Chan combination of two samples"
    )]
    pub const fn merge(self, other: Self) -> Self {
        if self.count == 0 {
            return other;
        }
        if other.count == 0 {
            return self;
        }
        let count = self.count + other.count;
        let total = as_f64(count);
        let left = as_f64(self.count);
        let right = as_f64(other.count);
        let delta = other.mean - self.mean;
        Self {
            count,
            mean: self.mean + delta * right / total,
            m2: self.m2 + other.m2 + delta * delta * left * right / total,
        }
    }

    /// Number of observations.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Sample mean, `0` when empty.
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Population standard deviation, `0` when empty.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "variance from the running sum of squares"
    )]
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / as_f64(self.count)).max(0.0).sqrt()
        }
    }
}

/// Counts, bounds and spread of a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DatasetProfile {
    /// Nodes, including dense nodes.
    pub nodes: u64,
    /// Nodes with a valid location.
    pub located_nodes: u64,
    /// Ways.
    pub ways: u64,
    /// Relations.
    pub relations: u64,
    /// Bounding box of located nodes.
    pub bounds: Option<Rect<f64>>,
    /// Longitude statistics.
    pub lon: AxisStats,
    /// Latitude statistics.
    pub lat: AxisStats,
}

impl DatasetProfile {
    /// Fold one streamed element in.
    pub fn record(&mut self, element: &OsmElement) {
        match element {
            OsmElement::Node(node) => self.record_node(node.location),
            OsmElement::Way(_) => self.record_way(),
            OsmElement::Relation(_) => self.record_relation(),
        }
    }

    /// Count a node and fold its location in when present.
    pub fn record_node(&mut self, location: Option<Coord<f64>>) {
        self.nodes += 1;
        let Some(coord) = location else {
            return;
        };
        self.located_nodes += 1;
        self.lon.push(coord.x);
        self.lat.push(coord.y);
        self.bounds = merge_bounds(self.bounds, Some(Rect::new(coord, coord)));
    }

    /// Count a way.
    pub const fn record_way(&mut self) {
        self.ways += 1;
    }

    /// Count a relation.
    pub const fn record_relation(&mut self) {
        self.relations += 1;
    }

    /// Profile of both element streams.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        Self {
            nodes: self.nodes + other.nodes,
            located_nodes: self.located_nodes + other.located_nodes,
            ways: self.ways + other.ways,
            relations: self.relations + other.relations,
            bounds: merge_bounds(self.bounds, other.bounds),
            lon: self.lon.merge(other.lon),
            lat: self.lat.merge(other.lat),
        }
    }

    /// Mean node location.
    #[must_use]
    pub const fn centroid(&self) -> Option<Coord<f64>> {
        if self.located_nodes == 0 {
            None
        } else {
            Some(Coord {
                x: self.lon.mean(),
                y: self.lat.mean(),
            })
        }
    }

    /// Per-axis population standard deviation.
    #[must_use]
    pub fn std_dev(&self) -> Option<Coord<f64>> {
        (self.located_nodes > 0).then(|| Coord {
            x: self.lon.std_dev(),
            y: self.lat.std_dev(),
        })
    }
}

fn merge_bounds(lhs: Option<Rect<f64>>, rhs: Option<Rect<f64>>) -> Option<Rect<f64>> {
    match (lhs, rhs) {
        (Some(left), Some(right)) => Some(Rect::new(
            Coord {
                x: left.min().x.min(right.min().x),
                y: left.min().y.min(right.min().y),
            },
            Coord {
                x: left.max().x.max(right.max().x),
                y: left.max().y.max(right.max().y),
            },
        )),
        (Some(bounds), None) | (None, Some(bounds)) => Some(bounds),
        (None, None) => None,
    }
}

/// Output of the `analyze` command.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeReport {
    /// Dataset statistics.
    pub profile: DatasetProfile,
    /// Grid batch mode would use, absent for datasets without located nodes.
    pub partition: Option<GridPartition>,
}

/// Profile `source` and derive the batch grid for `max_nodes_per_cell`.
pub fn analyze(
    source: &dyn ElementSource,
    max_nodes_per_cell: u64,
) -> Result<AnalyzeReport, SourceError> {
    let profile = source.profile()?;
    let partition = GridPartition::from_profile(&profile, max_nodes_per_cell);
    Ok(AnalyzeReport { profile, partition })
}

impl fmt::Display for AnalyzeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let profile = &self.profile;
        writeln!(f, "nodes: {}", profile.nodes)?;
        writeln!(f, "located nodes: {}", profile.located_nodes)?;
        writeln!(f, "ways: {}", profile.ways)?;
        writeln!(f, "relations: {}", profile.relations)?;
        if let Some(bounds) = profile.bounds {
            writeln!(
                f,
                "bounds: [{:.7}, {:.7}] - [{:.7}, {:.7}]",
                bounds.min().x,
                bounds.min().y,
                bounds.max().x,
                bounds.max().y
            )?;
        }
        if let (Some(centroid), Some(spread)) = (profile.centroid(), profile.std_dev()) {
            writeln!(f, "centroid: ({:.7}, {:.7})", centroid.x, centroid.y)?;
            writeln!(f, "std dev: ({:.7}, {:.7})", spread.x, spread.y)?;
        }
        match &self.partition {
            Some(partition) => {
                writeln!(
                    f,
                    "grid: {} x {} cells",
                    partition.columns(),
                    partition.rows()
                )?;
                writeln!(f, "longitude divisions: {:?}", partition.x_divisions())?;
                write!(f, "latitude divisions: {:?}", partition.y_divisions())
            }
            None => write!(f, "grid: none (no located nodes)"),
        }
    }
}
