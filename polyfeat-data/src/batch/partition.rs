//! Density-aware geographic grid.
//!
//! Each axis is divided at normal quantiles of the node distribution, so
//! dense regions get narrow cells. Cells are half-open `[min, max)` on both
//! axes except the last cell of each axis, which also holds its upper bound;
//! every in-bounds coordinate therefore belongs to exactly one cell.

use geo::{Coord, Rect};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::analyze::DatasetProfile;

/// Upper bound on splits per axis.
pub const MAX_SPLITS: u32 = 256;

/// Splits per axis so that `nodes` spread over `splits²` cells stay under
/// `max_nodes_per_cell` each.
#[must_use]
pub fn split_count(nodes: u64, max_nodes_per_cell: u64) -> u32 {
    let cells = nodes.div_ceil(max_nodes_per_cell.max(1));
    let mut splits = cells.isqrt();
    if splits.saturating_mul(splits) < cells {
        splits += 1;
    }
    u32::try_from(splits.max(1))
        .unwrap_or(MAX_SPLITS)
        .min(MAX_SPLITS)
}

/// One grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// Row-major position in [`GridPartition::cells`].
    pub index: usize,
    /// Column along the longitude axis.
    pub column: usize,
    /// Row along the latitude axis.
    pub row: usize,
    /// Cell extent.
    pub bounds: Rect<f64>,
}

/// Grid over a dataset's bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPartition {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl GridPartition {
    /// Grid for `profile`, or `None` when it has no located nodes.
    #[must_use]
    pub fn from_profile(profile: &DatasetProfile, max_nodes_per_cell: u64) -> Option<Self> {
        let bounds = profile.bounds?;
        let centroid = profile.centroid()?;
        let spread = profile.std_dev()?;
        let splits = split_count(profile.located_nodes, max_nodes_per_cell);
        Some(Self {
            xs: axis_divisions(bounds.min().x, bounds.max().x, centroid.x, spread.x, splits),
            ys: axis_divisions(bounds.min().y, bounds.max().y, centroid.y, spread.y, splits),
        })
    }

    /// Evenly spaced `splits` × `splits` grid.
    #[must_use]
    pub fn uniform(bounds: Rect<f64>, requested: u32) -> Self {
        let splits = requested.max(1);
        Self {
            xs: uniform_divisions(bounds.min().x, bounds.max().x, splits),
            ys: uniform_divisions(bounds.min().y, bounds.max().y, splits),
        }
    }

    /// Cells along the longitude axis.
    #[must_use]
    pub fn columns(&self) -> usize {
        self.xs.len().saturating_sub(1)
    }

    /// Cells along the latitude axis.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.ys.len().saturating_sub(1)
    }

    /// Total number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns() * self.rows()
    }

    /// Whether the grid has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Longitude divisions, bounds included.
    #[must_use]
    pub fn x_divisions(&self) -> &[f64] {
        &self.xs
    }

    /// Latitude divisions, bounds included.
    #[must_use]
    pub fn y_divisions(&self) -> &[f64] {
        &self.ys
    }

    /// Index of the cell owning `coord`, `None` outside the grid.
    #[must_use]
    pub fn cell_of(&self, coord: Coord<f64>) -> Option<usize> {
        let column = axis_slot(&self.xs, coord.x)?;
        let row = axis_slot(&self.ys, coord.y)?;
        Some(row * self.columns() + column)
    }

    /// Every cell in row-major order.
    #[must_use]
    pub fn cells(&self) -> Vec<Cell> {
        let mut cells = Vec::with_capacity(self.len());
        for (row, lat) in self.ys.windows(2).enumerate() {
            for (column, lon) in self.xs.windows(2).enumerate() {
                let (Some(west), Some(east), Some(south), Some(north)) =
                    (lon.first(), lon.last(), lat.first(), lat.last())
                else {
                    continue;
                };
                cells.push(Cell {
                    index: row * self.columns() + column,
                    column,
                    row,
                    bounds: Rect::new(
                        Coord { x: *west, y: *south },
                        Coord { x: *east, y: *north },
                    ),
                });
            }
        }
        cells
    }
}

fn axis_slot(divisions: &[f64], value: f64) -> Option<usize> {
    let (first, last) = (divisions.first()?, divisions.last()?);
    if value.is_nan() || value < *first || value > *last || divisions.len() < 2 {
        return None;
    }
    let interior = divisions.get(1..divisions.len() - 1)?;
    Some(interior.partition_point(|division| *division <= value))
}

#[expect(clippy::float_arithmetic, reason = "cell width is the extent over the split count")]
fn uniform_divisions(min: f64, max: f64, splits: u32) -> Vec<f64> {
    let step = (max - min) / f64::from(splits);
    let mut divisions: Vec<f64> = (0..splits)
        .map(|i| step.mul_add(f64::from(i), min))
        .collect();
    divisions.push(max);
    divisions
}

/// Divisions at the normal quantiles of evenly spaced CDF values between
/// `cdf(min)` and `cdf(max)`, pinned to the bounds and forced monotonic.
#[expect(
    clippy::float_arithmetic,
    reason = "quantile placement interpolates between CDF bounds"
)]
fn axis_divisions(min: f64, max: f64, mean: f64, std_dev: f64, splits: u32) -> Vec<f64> {
    let normal = match Normal::new(mean, std_dev) {
        Ok(normal) if splits > 1 => normal,
        _ => return uniform_divisions(min, max, splits.max(1)),
    };
    let low = normal.cdf(min);
    let high = normal.cdf(max);
    if high - low <= f64::EPSILON {
        return uniform_divisions(min, max, splits);
    }
    let mut divisions = vec![min];
    let mut previous = min;
    for i in 1..splits {
        let p = (high - low).mul_add(f64::from(i) / f64::from(splits), low);
        let division = normal.inverse_cdf(p.clamp(0.0, 1.0)).max(previous).min(max);
        divisions.push(division);
        previous = division;
    }
    divisions.push(max);
    divisions
}
