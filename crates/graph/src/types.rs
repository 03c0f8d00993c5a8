use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a network node (junction, manhole, plant, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Geographic position, carried through for rendering only
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Node in flow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: NodeId,

    /// Optional location (first record mentioning the node wins)
    pub location: Option<GeoPoint>,
}

/// Edge in flow graph: contamination can travel from source to target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    /// Polyline as `[lat, lon]` pairs, opaque to the algorithm
    pub geometry: Option<Vec<[f64; 2]>>,
}

/// Directed flow network
#[derive(Debug, Clone)]
pub struct FlowGraph {
    /// Arena of nodes and edges
    pub graph: DiGraph<FlowNode, FlowEdge>,

    /// Node id -> NodeIndex mapping for fast lookup
    pub node_index: HashMap<NodeId, NodeIndex>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
        }
    }

    /// Add node to graph, or fill in a missing location on an existing one
    pub fn add_node(&mut self, id: NodeId, location: Option<GeoPoint>) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&id) {
            let node = &mut self.graph[idx];
            if node.location.is_none() {
                node.location = location;
            }
            return idx;
        }

        let idx = self.graph.add_node(FlowNode { id, location });
        self.node_index.insert(id, idx);
        idx
    }

    /// Add edge between nodes, creating endpoints as needed.
    ///
    /// Parallel edges are collapsed; returns `false` when the edge already existed.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, edge: FlowEdge) -> bool {
        let from_idx = self.add_node(from, None);
        let to_idx = self.add_node(to, None);

        if self.graph.find_edge(from_idx, to_idx).is_some() {
            return false;
        }
        self.graph.add_edge(from_idx, to_idx, edge);
        true
    }

    /// Find node index by id
    pub fn find_node(&self, id: NodeId) -> Option<NodeIndex> {
        self.node_index.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    /// Get node data
    pub fn get_node(&self, id: NodeId) -> Option<&FlowNode> {
        self.find_node(id)
            .and_then(|idx| self.graph.node_weight(idx))
    }

    /// Node id at an arena index
    pub fn id_at(&self, idx: NodeIndex) -> Option<NodeId> {
        self.graph.node_weight(idx).map(|node| node.id)
    }

    /// All node ids in ascending order
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.node_index.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All edges as `(source, target)` id pairs, in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, &FlowEdge)> {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].id,
                self.graph[e.target()].id,
                e.weight(),
            )
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Full dump of nodes and edges, used once at the start of a trace
    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .graph
            .node_weights()
            .map(|node| NodeSnapshot {
                id: node.id,
                lat: node.location.map(|p| p.lat),
                lon: node.location.map(|p| p.lon),
            })
            .collect();

        let edges = self
            .edges()
            .map(|(source, target, edge)| EdgeSnapshot {
                source,
                target,
                geometry: edge.geometry.clone(),
            })
            .collect();

        GraphSnapshot { nodes, edges }
    }
}

impl Default for FlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}
