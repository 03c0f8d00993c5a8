use crate::types::{FlowGraph, NodeId};
use petgraph::algo::astar;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use std::collections::{BTreeSet, HashSet, VecDeque};

impl FlowGraph {
    /// All nodes with a directed path to `node`, including `node` itself.
    ///
    /// Returns an empty set when `node` is not in the graph.
    pub fn ancestors(&self, node: NodeId) -> BTreeSet<NodeId> {
        match self.find_node(node) {
            Some(start) => self.collect_ids(self.walk_upstream(start)),
            None => BTreeSet::new(),
        }
    }

    /// Nodes that can reach `sink`, the sink included
    pub fn universe(&self, sink: NodeId) -> BTreeSet<NodeId> {
        self.ancestors(sink)
    }

    /// Copy of the graph with every edge inverted; ids and indices are preserved
    pub fn reverse(&self) -> FlowGraph {
        let mut graph = self.graph.clone();
        graph.reverse();
        FlowGraph {
            graph,
            node_index: self.node_index.clone(),
        }
    }

    /// Fewest-hop path from `source` to `target`, both ends included
    pub fn shortest_path(&self, source: NodeId, target: NodeId) -> Option<Vec<NodeId>> {
        let from = self.find_node(source)?;
        let to = self.find_node(target)?;

        let (_, path) = astar(&self.graph, from, |n| n == to, |_| 1usize, |_| 0)?;
        path.into_iter().map(|idx| self.id_at(idx)).collect()
    }

    fn walk_upstream(&self, start: NodeIndex) -> HashSet<NodeIndex> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for next in self.graph.neighbors_directed(current, Direction::Incoming) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        visited
    }

    fn collect_ids(&self, indices: HashSet<NodeIndex>) -> BTreeSet<NodeId> {
        indices
            .into_iter()
            .filter_map(|idx| self.id_at(idx))
            .collect()
    }
}
