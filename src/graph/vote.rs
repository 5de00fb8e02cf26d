//! Per-user vote records

use super::node::{AggregateCounts, NodeId, VoteDirection, VoteKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single user's vote on one dimension of a node.
///
/// Unique per (node_id, user_id, kind); a re-vote overwrites the direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub node_id: NodeId,
    pub user_id: String,
    pub kind: VoteKind,
    pub direction: VoteDirection,
    pub updated_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn new(node_id: NodeId, user_id: impl Into<String>, kind: VoteKind, direction: VoteDirection) -> Self {
        Self {
            node_id,
            user_id: user_id.into(),
            kind,
            direction,
            updated_at: Utc::now(),
        }
    }
}

/// One user's position on one vote dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    #[default]
    None,
    Agree,
    Disagree,
}

impl Stance {
    pub fn of(vote: Option<&VoteRecord>) -> Self {
        match vote.map(|v| v.direction) {
            None => Stance::None,
            Some(VoteDirection::Positive) => Stance::Agree,
            Some(VoteDirection::Negative) => Stance::Disagree,
        }
    }
}

/// A user's stance on both dimensions plus the node's current totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteStatus {
    pub inclusion_status: Stance,
    pub content_status: Stance,
    pub counts: AggregateCounts,
}
