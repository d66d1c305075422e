//! DAG error types

use thiserror::Error;

/// Result type for DAG operations
pub type DagResult<T> = std::result::Result<T, DagError>;

/// Errors reported by [`DirtyGraph`](crate::DirtyGraph) and the executor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DagError {
    /// Kahn's algorithm could not order every node
    #[error("Cycle detected: ordered {ordered} of {total} nodes")]
    CycleDetected { ordered: usize, total: usize },

    /// Operation on a node id that is not in the graph
    #[error("Node not found: {0}")]
    NodeNotFound(String),
}
