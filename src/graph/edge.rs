//! Tag edges and the derived relationships between content nodes
//!
//! Derived edges are independent records keyed by a canonical node pair plus
//! a discriminator (word or category). Nothing here owns pointers to nodes;
//! every lookup goes through the store by key.

use super::node::NodeId;
use serde::{Deserialize, Serialize};

/// Unordered pair of distinct nodes, stored in sorted order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePair {
    low: NodeId,
    high: NodeId,
}

impl NodePair {
    /// Build the canonical pair. Returns `None` for a self-pair.
    pub fn new(a: NodeId, b: NodeId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> &NodeId {
        &self.low
    }

    pub fn high(&self) -> &NodeId {
        &self.high
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        &self.low == id || &self.high == id
    }

    /// The member that is not `id`
    pub fn other(&self, id: &NodeId) -> Option<&NodeId> {
        if &self.low == id {
            Some(&self.high)
        } else if &self.high == id {
            Some(&self.low)
        } else {
            None
        }
    }
}

/// Where a keyword on a node came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSource {
    /// Supplied by the author
    User,
    /// Produced by the keyword extraction service
    Extracted,
}

impl TagSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagSource::User => "user",
            TagSource::Extracted => "extracted",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "user" => Some(TagSource::User),
            "extracted" => Some(TagSource::Extracted),
            _ => None,
        }
    }
}

/// One entry of a node's tag set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    pub frequency: f64,
    pub source: TagSource,
}

impl Keyword {
    pub fn new(word: impl Into<String>, frequency: f64, source: TagSource) -> Self {
        Self {
            word: word.into(),
            frequency,
            source,
        }
    }

    /// An author-supplied keyword with unit frequency
    pub fn user(word: impl Into<String>) -> Self {
        Self::new(word, 1.0, TagSource::User)
    }
}

/// Normalize a word for lookup: trimmed, lower-cased.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// TAGGED edge: node → word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedEdge {
    pub node_id: NodeId,
    pub word: String,
    pub frequency: f64,
    pub source: TagSource,
}

/// SHARED_TAG edge between two nodes tagged with the same word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedTag {
    pub pair: NodePair,
    pub word: String,
    /// Σ(f₁ × f₂) over shared tagging events
    pub strength: f64,
}

/// SHARED_CATEGORY edge between two nodes in the same category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedCategory {
    pub pair: NodePair,
    pub category_id: NodeId,
    /// Number of co-categorisation events
    pub strength: f64,
}
