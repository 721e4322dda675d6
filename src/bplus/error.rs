use thiserror::Error;

use super::node::NodeId;

/// Errors that can occur during B+ tree operations
#[derive(Debug, Clone, Error)]
pub enum BPlusTreeError {
    #[error("Invalid order: {0} (must be >= 2)")]
    InvalidOrder(usize),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Corrupted tree: {0}")]
    Corrupted(String),
}

pub type BPlusTreeResult<T> = Result<T, BPlusTreeError>;
