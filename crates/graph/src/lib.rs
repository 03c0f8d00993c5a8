//! # Plume Graph
//!
//! Flow-network model for contamination source localization.
//!
//! ## Features
//!
//! - **Flow graph** - directed pipe network draining into a single sink
//! - **Reachability** - upstream/downstream sets, fewest-hop paths
//! - **Coverage sets** - per-node `J(v)` from the dominator tree of the reversed network
//! - **Record loading** - tolerant JSON edge-list ingestion
//!
//! ## Architecture
//!
//! ```text
//! EdgeRecord[]
//!     │
//!     ├──> FlowGraphBuilder (skips malformed rows)
//!     │
//!     ├──> FlowGraph (petgraph arena)
//!     │      ├─ Nodes: junctions, optional lat/lon
//!     │      └─ Edges: flow direction, optional polyline
//!     │
//!     └──> DominanceIndex
//!            ├─ Reverse graph rooted at the sink
//!            ├─ Immediate dominators -> dominator tree
//!            └─ J(v) = {v} ∪ subtree(v), or {v} on fallback
//! ```

mod types;
mod builder;
mod graph;
mod dominance;
mod error;

pub use types::{
    EdgeSnapshot, FlowEdge, FlowGraph, FlowNode, GeoPoint, GraphSnapshot, NodeId, NodeSnapshot,
};
pub use builder::{load_json, EdgeRecord, FlowGraphBuilder, LoadStats};
pub use dominance::{CoverageOutcome, DominanceIndex};
pub use error::{GraphError, Result};
