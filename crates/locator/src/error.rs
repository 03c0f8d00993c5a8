use plume_graph::{GraphError, NodeId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LocateError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("No eligible candidates: nothing upstream of sink {0}")]
    NoEligibleCandidates(NodeId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
