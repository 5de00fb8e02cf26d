//! Discussion containers and comment threading

use super::node::{NodeId, NodeKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscussionId(String);

impl DiscussionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DiscussionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DiscussionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The single discussion attached to a content node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discussion {
    pub id: DiscussionId,
    pub node_id: NodeId,
    pub node_kind: NodeKind,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Discussion {
    pub fn new(node_id: NodeId, node_kind: NodeKind, created_by: impl Into<String>) -> Self {
        Self {
            id: DiscussionId::new(),
            node_id,
            node_kind,
            created_by: created_by.into(),
            created_at: Utc::now(),
        }
    }
}

/// Where a comment node sits: its discussion and optional parent comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentLink {
    pub comment_id: NodeId,
    pub discussion_id: DiscussionId,
    pub parent_comment_id: Option<NodeId>,
}
