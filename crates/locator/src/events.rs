//! Append-only trace of a localization run, consumed by renderers.

use crate::oracle::Reading;
use plume_graph::{GraphSnapshot, NodeId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    InitialState,
    HeuristicSelection,
    KnowledgeUpdate,
    Pruning,
    PathCreation,
}

/// Sensor id with its lab result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorReading {
    pub id: NodeId,
    #[serde(rename = "value")]
    pub reading: Reading,
}

/// Round-specific part of an event, flattened next to the common fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepPayload {
    Initial {},
    Selection {
        round: usize,
        budget: usize,
        selected_nodes: Vec<NodeId>,
        /// Gain of each entry in `selected_nodes`, same order
        gains: Vec<usize>,
    },
    Measurement {
        round: usize,
        updated_nodes: Vec<SensorReading>,
    },
    Pruning {
        round: usize,
        discarded_nodes: Vec<NodeId>,
        remaining: usize,
    },
    OriginFound {
        found_node: NodeId,
        /// Empty when no path to the sink could be reconstructed
        path: Vec<NodeId>,
    },
}

/// Algorithm state shown next to the pseudocode: `S`, `aux`, `auxv`, `B`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraceVariables {
    /// All sensors chosen so far, this round included
    #[serde(rename = "S")]
    pub selected: Vec<NodeId>,
    #[serde(rename = "aux")]
    pub last_pick: Option<NodeId>,
    #[serde(rename = "auxv")]
    pub last_gain: Option<usize>,
    #[serde(rename = "B")]
    pub budget: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepEvent {
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub description: String,
    pub sink_node: NodeId,
    pub origin_node: NodeId,

    /// Present on the first event of a run only
    #[serde(flatten)]
    pub snapshot: Option<GraphSnapshot>,

    #[serde(flatten)]
    pub payload: StepPayload,

    pub variables: TraceVariables,
}

/// Receives events in order; write-only from the localizer's side
pub trait StepRecorder {
    fn record(&mut self, event: StepEvent);
}

impl StepRecorder for Vec<StepEvent> {
    fn record(&mut self, event: StepEvent) {
        self.push(event);
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecorder;

impl StepRecorder for NullRecorder {
    fn record(&mut self, _event: StepEvent) {}
}
