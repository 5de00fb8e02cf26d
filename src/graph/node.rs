//! Content nodes and their vote counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for a node
///
/// Serializes as a plain string (UUID or semantic ID like "word:justice")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a new random NodeId (UUID-based)
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a NodeId from a string (semantic ID)
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The closed set of content kinds living in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Word,
    Definition,
    Statement,
    OpenQuestion,
    Answer,
    Evidence,
    Category,
    Comment,
}

impl NodeKind {
    pub const ALL: [NodeKind; 8] = [
        NodeKind::Word,
        NodeKind::Definition,
        NodeKind::Statement,
        NodeKind::OpenQuestion,
        NodeKind::Answer,
        NodeKind::Evidence,
        NodeKind::Category,
        NodeKind::Comment,
    ];

    /// Stable storage tag
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Word => "word",
            NodeKind::Definition => "definition",
            NodeKind::Statement => "statement",
            NodeKind::OpenQuestion => "open_question",
            NodeKind::Answer => "answer",
            NodeKind::Evidence => "evidence",
            NodeKind::Category => "category",
            NodeKind::Comment => "comment",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == tag)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two vote dimensions a vote targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
    /// Admission of the node into the visible corpus
    Inclusion,
    /// Agreement with the node's substantive content
    Content,
}

impl VoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteKind::Inclusion => "inclusion",
            VoteKind::Content => "content",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "inclusion" => Some(VoteKind::Inclusion),
            "content" => Some(VoteKind::Content),
            _ => None,
        }
    }
}

impl std::fmt::Display for VoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    Positive,
    Negative,
}

impl VoteDirection {
    pub fn from_positive(is_positive: bool) -> Self {
        if is_positive {
            VoteDirection::Positive
        } else {
            VoteDirection::Negative
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, VoteDirection::Positive)
    }
}

/// Positive/negative totals for one vote kind
///
/// `net` is always `positive - negative`; construct through [`VoteCounts::new`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub positive: i64,
    pub negative: i64,
    pub net: i64,
}

impl VoteCounts {
    pub fn new(positive: i64, negative: i64) -> Self {
        Self {
            positive,
            negative,
            net: positive - negative,
        }
    }
}

/// Both vote dimensions of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCounts {
    pub inclusion: VoteCounts,
    pub content: VoteCounts,
}

impl AggregateCounts {
    pub fn get(&self, kind: VoteKind) -> VoteCounts {
        match kind {
            VoteKind::Inclusion => self.inclusion,
            VoteKind::Content => self.content,
        }
    }
}

/// Typed property values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<PropertyValue>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

/// Properties collection
pub type Properties = HashMap<String, PropertyValue>;

/// A node in the content graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub created_by: String,
    /// Whether the author is credited publicly
    pub public_credit: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub inclusion: VoteCounts,
    /// Stays at zero for kinds without content voting
    pub content: VoteCounts,
    /// Kind-specific fields (text, word, parent ids, ...)
    pub properties: Properties,
}

impl ContentNode {
    /// Create a fresh node with zeroed counters
    pub fn new(kind: NodeKind, created_by: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::new(),
            kind,
            created_by: created_by.into(),
            public_credit: false,
            created_at: now,
            updated_at: now,
            inclusion: VoteCounts::default(),
            content: VoteCounts::default(),
            properties: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    pub fn with_public_credit(mut self, public_credit: bool) -> Self {
        self.public_credit = public_credit;
        self
    }

    /// Add a property to the node
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn counts(&self) -> AggregateCounts {
        AggregateCounts {
            inclusion: self.inclusion,
            content: self.content,
        }
    }

    /// String property lookup
    pub fn text_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_counts_net_is_derived() {
        let counts = VoteCounts::new(3, 5);
        assert_eq!(counts.net, -2);
    }

    #[test]
    fn node_kind_tags_roundtrip() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NodeKind::parse("quantity"), None);
    }

    #[test]
    fn node_id_serializes_as_string() {
        let id = NodeId::from_string("word:justice");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"word:justice\"");
    }

    #[test]
    fn new_node_starts_with_zero_counters() {
        let node = ContentNode::new(NodeKind::Statement, "user-1")
            .with_property("statement", "Water is wet");
        assert_eq!(node.counts(), AggregateCounts::default());
        assert_eq!(node.text_property("statement"), Some("Water is wet"));
    }
}
