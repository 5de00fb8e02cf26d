//! Peer reviews of evidence nodes

use super::node::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest and highest score accepted on every review dimension
pub const SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// The three review dimensions, each in [`SCORE_RANGE`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewScores {
    pub quality: u8,
    pub independence: u8,
    pub relevance: u8,
}

impl ReviewScores {
    pub fn new(quality: u8, independence: u8, relevance: u8) -> Self {
        Self {
            quality,
            independence,
            relevance,
        }
    }

    /// First dimension outside the accepted range, if any
    pub fn out_of_range(&self) -> Option<(&'static str, u8)> {
        [
            ("quality", self.quality),
            ("independence", self.independence),
            ("relevance", self.relevance),
        ]
        .into_iter()
        .find(|(_, score)| !SCORE_RANGE.contains(score))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerReview {
    pub evidence_id: NodeId,
    pub user_id: String,
    pub scores: ReviewScores,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Derived review statistics for one evidence node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAggregate {
    pub evidence_id: NodeId,
    pub avg_quality: f64,
    pub avg_independence: f64,
    pub avg_relevance: f64,
    pub overall_score: f64,
    pub review_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_out_of_range_dimension() {
        assert_eq!(ReviewScores::new(5, 1, 3).out_of_range(), None);
        assert_eq!(ReviewScores::new(5, 0, 3).out_of_range(), Some(("independence", 0)));
        assert_eq!(ReviewScores::new(6, 1, 3).out_of_range(), Some(("quality", 6)));
    }
}
