//! Core error taxonomy

use crate::graph::{NodeId, NodeKind};
use crate::storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the voting and graph-consistency core
#[derive(Debug, Error)]
pub enum TallyError {
    /// Malformed input: empty ids or text, too many categories, out-of-range scores
    #[error("Validation error: {0}")]
    Validation(String),

    /// The node kind does not support the requested operation
    #[error("{kind} nodes do not support {operation}")]
    Capability {
        kind: NodeKind,
        operation: &'static str,
    },

    /// A gated action was attempted before the node passed inclusion
    #[error("Threshold not met: {0}")]
    ThresholdNotMet(String),

    /// A referenced word, category or parent is missing or unapproved
    #[error("Dependency not found: {0}")]
    DependencyNotFound(String),

    #[error("User {user_id} has already reviewed evidence {evidence_id}")]
    DuplicateReview { evidence_id: NodeId, user_id: String },

    #[error("Node not found: {0}")]
    NotFound(NodeId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TallyError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        TallyError::Validation(msg.into())
    }

    /// Whether the caller may retry the same request unchanged.
    ///
    /// Only write contention in the store qualifies; the core never retries itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TallyError::Storage(StorageError::Conflict(_)))
    }
}

/// Result type for core operations
pub type TallyResult<T> = Result<T, TallyError>;

/// Reject blank identifiers and text fields
pub(crate) fn require_non_blank(field: &str, value: &str) -> TallyResult<()> {
    if value.trim().is_empty() {
        return Err(TallyError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}
