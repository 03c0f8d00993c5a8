//! Coverage sets derived from the dominator tree of the reversed flow graph.
//!
//! In the reversed graph every path starts at the sink, so a node `d` that
//! dominates `n` there is a choke point on every path from `n` down to the sink
//! in the original network. `J(d)` collects `d` and everything it dominates: a
//! clean reading at `d` clears the whole set at once.

use crate::error::{GraphError, Result};
use crate::types::{FlowGraph, NodeId};
use log::{debug, warn};
use petgraph::algo::dominators::simple_fast;
use petgraph::graph::NodeIndex;
use std::collections::{BTreeSet, HashMap};

/// Per-node coverage sets `J(v)`, immutable once built
#[derive(Debug, Clone)]
pub struct DominanceIndex {
    sink: NodeId,
    coverage: HashMap<NodeId, BTreeSet<NodeId>>,
}

/// Result of building a [`DominanceIndex`].
///
/// Both variants carry a usable index; `Degenerate` means every node only
/// covers itself, so selection still works but needs more rounds.
#[derive(Debug, Clone)]
pub enum CoverageOutcome {
    Dominators(DominanceIndex),
    Degenerate {
        index: DominanceIndex,
        cause: GraphError,
    },
}

impl CoverageOutcome {
    pub fn index(&self) -> &DominanceIndex {
        match self {
            Self::Dominators(index) => index,
            Self::Degenerate { index, .. } => index,
        }
    }

    pub fn into_index(self) -> DominanceIndex {
        match self {
            Self::Dominators(index) => index,
            Self::Degenerate { index, .. } => index,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::Degenerate { .. })
    }
}

impl DominanceIndex {
    /// Build coverage sets for every node of `graph` relative to `sink`.
    ///
    /// Fails only when the sink is missing; a failed dominator computation
    /// falls back to [`DominanceIndex::degenerate`].
    pub fn build(graph: &FlowGraph, sink: NodeId) -> Result<CoverageOutcome> {
        if !graph.contains(sink) {
            return Err(GraphError::SinkNotFound(sink));
        }

        match Self::from_dominators(graph, sink) {
            Ok(index) => {
                debug!(
                    "Dominator coverage built for {} nodes (sink {sink})",
                    index.len()
                );
                Ok(CoverageOutcome::Dominators(index))
            }
            Err(cause) => {
                warn!("{cause}; falling back to single-node coverage");
                Ok(CoverageOutcome::Degenerate {
                    index: Self::degenerate(graph, sink),
                    cause,
                })
            }
        }
    }

    /// `J(v) = {v}` for every node
    pub fn degenerate(graph: &FlowGraph, sink: NodeId) -> Self {
        let coverage = graph
            .node_ids()
            .into_iter()
            .map(|id| (id, BTreeSet::from([id])))
            .collect();
        Self { sink, coverage }
    }

    fn from_dominators(graph: &FlowGraph, sink: NodeId) -> Result<Self> {
        let reversed = graph.reverse();
        let root = reversed
            .find_node(sink)
            .ok_or(GraphError::SinkNotFound(sink))?;

        if reversed.graph.neighbors(root).next().is_none() {
            return Err(GraphError::Dominance(format!(
                "no node drains into sink {sink}"
            )));
        }

        let dominators = simple_fast(&reversed.graph, root);

        let mut idom: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut children: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        for node in reversed.graph.node_indices() {
            if node == root {
                continue;
            }
            let Some(parent) = dominators.immediate_dominator(node) else {
                continue;
            };
            if parent == node {
                continue;
            }
            idom.insert(node, parent);
            children.entry(parent).or_default().push(node);
        }

        // Every idom chain must climb to the root without revisiting a node.
        // simple_fast already guarantees this for reachable nodes; the walk below
        // assumes it, so a violation degrades instead of looping.
        let limit = reversed.node_count();
        for &start in idom.keys() {
            let mut current = start;
            let mut steps = 0;
            while current != root {
                current = match idom.get(&current) {
                    Some(&parent) => parent,
                    None => {
                        return Err(GraphError::Dominance(format!(
                            "dominator chain of node {} stops before sink {sink}",
                            reversed.graph[start].id
                        )))
                    }
                };
                steps += 1;
                if steps > limit {
                    return Err(GraphError::Dominance(format!(
                        "dominator chain of node {} is cyclic",
                        reversed.graph[start].id
                    )));
                }
            }
        }

        let mut coverage = HashMap::with_capacity(reversed.node_count());
        for node in reversed.graph.node_indices() {
            let mut covered = BTreeSet::new();
            let mut stack = vec![node];
            while let Some(current) = stack.pop() {
                covered.insert(reversed.graph[current].id);
                if let Some(kids) = children.get(&current) {
                    stack.extend(kids.iter().copied());
                }
            }
            coverage.insert(reversed.graph[node].id, covered);
        }

        Ok(Self { sink, coverage })
    }

    pub fn sink(&self) -> NodeId {
        self.sink
    }

    /// Coverage set of `node`, if the node was part of the graph
    pub fn coverage(&self, node: NodeId) -> Option<&BTreeSet<NodeId>> {
        self.coverage.get(&node)
    }

    /// Members of `J(node)` that are still candidates and not yet covered.
    ///
    /// Nodes unknown to the index cover only themselves.
    pub fn uncovered<'a>(
        &'a self,
        node: NodeId,
        candidates: &'a BTreeSet<NodeId>,
        covered: &'a BTreeSet<NodeId>,
    ) -> impl Iterator<Item = NodeId> + 'a {
        let own = [node];
        let members: Box<dyn Iterator<Item = NodeId> + 'a> = match self.coverage.get(&node) {
            Some(set) => Box::new(set.iter().copied()),
            None => Box::new(own.into_iter()),
        };
        members.filter(move |n| candidates.contains(n) && !covered.contains(n))
    }

    /// `|J(node) ∩ candidates \ covered|`
    pub fn gain(
        &self,
        node: NodeId,
        candidates: &BTreeSet<NodeId>,
        covered: &BTreeSet<NodeId>,
    ) -> usize {
        self.uncovered(node, candidates, covered).count()
    }

    fn len(&self) -> usize {
        self.coverage.len()
    }

    /// Coverage sets in ascending node order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &BTreeSet<NodeId>)> {
        let mut entries: Vec<_> = self.coverage.iter().map(|(&id, set)| (id, set)).collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        entries.into_iter()
    }
}
