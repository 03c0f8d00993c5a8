use plume_graph::{FlowGraph, NodeId};
use serde::{Serialize, Serializer};

/// Binary lab result for one sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reading {
    Negative,
    Positive,
}

impl Reading {
    pub fn value(self) -> u8 {
        match self {
            Self::Negative => 0,
            Self::Positive => 1,
        }
    }

    pub fn is_positive(self) -> bool {
        self == Self::Positive
    }
}

impl From<bool> for Reading {
    fn from(detected: bool) -> Self {
        if detected {
            Self::Positive
        } else {
            Self::Negative
        }
    }
}

// Traces carry readings as 0/1.
impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

/// Answers "is the origin upstream of this sensor?"
pub trait MeasurementOracle {
    fn test(&self, sensor: NodeId) -> Reading;
}

impl<F> MeasurementOracle for F
where
    F: Fn(NodeId) -> Reading,
{
    fn test(&self, sensor: NodeId) -> Reading {
        self(sensor)
    }
}

/// Ground truth for simulated runs: positive iff the origin drains into the sensor
#[derive(Debug, Clone, Copy)]
pub struct SimulatedOracle<'g> {
    graph: &'g FlowGraph,
    origin: NodeId,
}

impl<'g> SimulatedOracle<'g> {
    pub fn new(graph: &'g FlowGraph, origin: NodeId) -> Self {
        Self { graph, origin }
    }

    pub fn origin(&self) -> NodeId {
        self.origin
    }
}

impl MeasurementOracle for SimulatedOracle<'_> {
    fn test(&self, sensor: NodeId) -> Reading {
        Reading::from(self.graph.ancestors(sensor).contains(&self.origin))
    }
}
