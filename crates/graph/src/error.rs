use crate::types::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Graph build error: {0}")]
    BuildError(String),

    #[error("Sink node {0} is not part of the flow graph")]
    SinkNotFound(NodeId),

    #[error("Dominator computation failed: {0}")]
    Dominance(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
