use crate::error::{GraphError, Result};
use crate::types::{FlowEdge, FlowGraph, GeoPoint, NodeId};
use log::{debug, info};
use serde::Deserialize;

/// One row of the pipe network export.
///
/// `geometry` is the pipe polyline as `[lat, lon]` pairs; its first and last
/// points locate `source` and `target`. When `adj_list` is present it replaces
/// `target` as the set of logical successors of `source`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EdgeRecord {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub geometry: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub adj_list: Option<Vec<NodeId>>,
}

impl EdgeRecord {
    fn validate(&self) -> Result<()> {
        if let Some(points) = &self.geometry {
            if points.is_empty() {
                return Err(GraphError::InvalidRecord(format!(
                    "edge {} -> {} has an empty geometry",
                    self.source, self.target
                )));
            }
            if points.iter().flatten().any(|c| !c.is_finite()) {
                return Err(GraphError::InvalidRecord(format!(
                    "edge {} -> {} has non-finite coordinates",
                    self.source, self.target
                )));
            }
        }
        Ok(())
    }
}

/// Counters for a load; skipped records are dropped without further trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub accepted: usize,
    pub skipped: usize,
}

/// Build a flow graph from edge records, skipping malformed ones
#[derive(Debug, Default)]
pub struct FlowGraphBuilder {
    graph: FlowGraph,
    stats: LoadStats,
}

impl FlowGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw JSON record; returns `false` when it was skipped
    pub fn push_value(&mut self, value: serde_json::Value) -> bool {
        match serde_json::from_value::<EdgeRecord>(value) {
            Ok(record) => self.push_record(record),
            Err(err) => {
                debug!("Skipping malformed edge record: {err}");
                self.stats.skipped += 1;
                false
            }
        }
    }

    /// Add a typed record; returns `false` when it was skipped
    pub fn push_record(&mut self, record: EdgeRecord) -> bool {
        if let Err(err) = record.validate() {
            debug!("Skipping edge record: {err}");
            self.stats.skipped += 1;
            return false;
        }

        let (from_point, to_point) = match &record.geometry {
            Some(points) => (
                points.first().map(to_point),
                points.last().map(to_point),
            ),
            None => (None, None),
        };

        self.graph.add_node(record.source, from_point);
        self.graph.add_node(record.target, to_point);

        match &record.adj_list {
            Some(successors) => {
                for &next in successors {
                    self.graph
                        .add_edge(record.source, next, FlowEdge::default());
                }
            }
            None => {
                self.graph.add_edge(
                    record.source,
                    record.target,
                    FlowEdge {
                        geometry: record.geometry.clone(),
                    },
                );
            }
        }

        self.stats.accepted += 1;
        true
    }

    pub fn build(self) -> (FlowGraph, LoadStats) {
        info!(
            "Flow graph loaded: {} nodes, {} edges ({} records accepted, {} skipped)",
            self.graph.node_count(),
            self.graph.edge_count(),
            self.stats.accepted,
            self.stats.skipped
        );
        (self.graph, self.stats)
    }
}

fn to_point(pair: &[f64; 2]) -> GeoPoint {
    GeoPoint {
        lat: pair[0],
        lon: pair[1],
    }
}

/// Parse a JSON array of edge records.
///
/// Only a document that is not an array at all is an error; bad rows are skipped.
pub fn load_json(input: &str) -> Result<(FlowGraph, LoadStats)> {
    let document: serde_json::Value = serde_json::from_str(input)
        .map_err(|e| GraphError::BuildError(format!("Edge list is not valid JSON: {e}")))?;

    let serde_json::Value::Array(rows) = document else {
        return Err(GraphError::BuildError(
            "Edge list must be a JSON array of records".to_string(),
        ));
    };

    let mut builder = FlowGraphBuilder::new();
    for row in rows {
        builder.push_value(row);
    }
    Ok(builder.build())
}
