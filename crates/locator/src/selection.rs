//! Greedy bounded-coverage sensor selection and reading-based pruning.

use crate::events::SensorReading;
use plume_graph::{DominanceIndex, FlowGraph, NodeId};
use serde::Serialize;
use std::collections::BTreeSet;

/// A chosen sensor and the number of candidates it newly covered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorPick {
    pub id: NodeId,
    pub gain: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Round budget `B`
    pub budget: usize,
    pub picks: Vec<SensorPick>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    pub fn sensors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.picks.iter().map(|pick| pick.id)
    }
}

/// `B = ceil(candidates / 2)`
pub fn round_budget(candidates: usize) -> usize {
    candidates.div_ceil(2)
}

/// Pick up to `sensors` nodes from `candidates`.
///
/// Each step takes the unselected candidate with the largest gain not above the
/// round budget; ties go to the smallest id. Selection stops early when no
/// candidate fits under the budget.
pub fn select_sensors(
    coverage: &DominanceIndex,
    candidates: &BTreeSet<NodeId>,
    accumulated: &BTreeSet<NodeId>,
    sensors: usize,
) -> Selection {
    let budget = round_budget(candidates.len());
    let mut picks: Vec<SensorPick> = Vec::with_capacity(sensors);
    let mut chosen: BTreeSet<NodeId> = BTreeSet::new();
    let mut covered: BTreeSet<NodeId> = BTreeSet::new();

    for _ in 0..sensors {
        let mut best: Option<SensorPick> = None;

        for &node in candidates {
            if accumulated.contains(&node) || chosen.contains(&node) {
                continue;
            }
            let gain = coverage.gain(node, candidates, &covered);
            if gain > budget {
                continue;
            }
            if best.map_or(true, |b| gain > b.gain) {
                best = Some(SensorPick { id: node, gain });
            }
        }

        let Some(pick) = best else {
            break;
        };
        let newly_covered: Vec<NodeId> = coverage
            .uncovered(pick.id, candidates, &covered)
            .collect();
        covered.extend(newly_covered);
        chosen.insert(pick.id);
        picks.push(pick);
    }

    Selection { budget, picks }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneOutcome {
    pub remaining: BTreeSet<NodeId>,
    pub discarded: BTreeSet<NodeId>,
}

/// Drop everything upstream of a negative sensor, then keep only what is
/// upstream of every positive one.
pub fn prune(
    graph: &FlowGraph,
    candidates: &BTreeSet<NodeId>,
    readings: &[SensorReading],
) -> PruneOutcome {
    let mut remaining = candidates.clone();

    for reading in readings.iter().filter(|r| !r.reading.is_positive()) {
        let upstream = graph.ancestors(reading.id);
        remaining.retain(|node| !upstream.contains(node));
    }

    let mut positives = readings.iter().filter(|r| r.reading.is_positive());
    if let Some(first) = positives.next() {
        let mut common = graph.ancestors(first.id);
        for reading in positives {
            let upstream = graph.ancestors(reading.id);
            common.retain(|node| upstream.contains(node));
        }
        remaining.retain(|node| common.contains(node));
    }

    let discarded = candidates.difference(&remaining).copied().collect();
    PruneOutcome {
        remaining,
        discarded,
    }
}
