//! Cross-cell bookkeeping for ways whose nodes fall in several cells.
//!
//! A cell knows only the coordinates of its own nodes. Each cell reports the
//! coordinates it knows for a way's distinct nodes, and whichever cell makes
//! the set complete receives every coordinate and matches the whole way.
//! Completion moves the way into the processed set, so later reports are
//! refused. A way with an unlocated node never completes and contributes
//! nothing.

use std::collections::{HashMap, HashSet};

use geo::Coord;
use polyfeat_core::{NodeId, WayId};

/// Result of reporting the known part of a way.
#[derive(Debug, Clone, PartialEq)]
pub enum WayObservation {
    /// Stored; some nodes are still unknown.
    Recorded,
    /// Every node is known; the caller must process the way.
    Completed(HashMap<NodeId, Coord<f64>>),
    /// The way was already processed by another cell.
    AlreadyProcessed,
}

#[derive(Debug, Clone, Default)]
struct PendingWay {
    needed: usize,
    known: HashMap<NodeId, Coord<f64>>,
}

/// Shared table of partly located ways.
#[derive(Debug, Default)]
pub struct BorderLedger {
    pending: HashMap<WayId, PendingWay>,
    processed: HashSet<WayId>,
}

impl BorderLedger {
    /// Report the coordinates a cell knows for `way`, which has `needed`
    /// distinct nodes.
    pub fn observe_way<I>(&mut self, way: WayId, needed: usize, known: I) -> WayObservation
    where
        I: IntoIterator<Item = (NodeId, Coord<f64>)>,
    {
        if self.processed.contains(&way) {
            return WayObservation::AlreadyProcessed;
        }
        let entry = self.pending.entry(way).or_default();
        entry.needed = needed;
        entry.known.extend(known);
        if entry.known.len() < entry.needed {
            return WayObservation::Recorded;
        }
        self.processed.insert(way);
        self.pending
            .remove(&way)
            .map_or(WayObservation::Recorded, |pending| {
                WayObservation::Completed(pending.known)
            })
    }

    /// Ways never completed, in ascending id order.
    #[must_use]
    pub fn unfinished(&self) -> Vec<WayId> {
        let mut ids: Vec<WayId> = self.pending.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Ways completed so far.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.processed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn at(x: f64) -> Coord<f64> {
        Coord { x, y: 0.0 }
    }

    #[rstest]
    fn way_completes_when_every_node_is_known() {
        let mut ledger = BorderLedger::default();
        assert_eq!(
            ledger.observe_way(9, 3, [(1, at(0.0)), (2, at(1.0))]),
            WayObservation::Recorded
        );
        assert_eq!(ledger.unfinished(), vec![9]);
        let WayObservation::Completed(known) = ledger.observe_way(9, 3, [(3, at(2.0))]) else {
            panic!("way should complete");
        };
        assert_eq!(known.len(), 3);
        assert_eq!(
            ledger.observe_way(9, 3, [(1, at(0.0))]),
            WayObservation::AlreadyProcessed
        );
        assert!(ledger.unfinished().is_empty());
        assert_eq!(ledger.completed(), 1);
    }

    #[rstest]
    fn repeated_reports_of_one_node_do_not_complete_a_way() {
        let mut ledger = BorderLedger::default();
        ledger.observe_way(4, 2, [(1, at(0.0))]);
        assert_eq!(
            ledger.observe_way(4, 2, [(1, at(0.0))]),
            WayObservation::Recorded
        );
    }

    #[rstest]
    fn ways_are_independent() {
        let mut ledger = BorderLedger::default();
        ledger.observe_way(7, 2, [(1, at(0.0))]);
        assert_eq!(
            ledger.observe_way(8, 2, [(2, at(1.0))]),
            WayObservation::Recorded
        );
        assert_eq!(ledger.unfinished(), vec![7, 8]);
    }
}
