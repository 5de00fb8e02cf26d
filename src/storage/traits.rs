//! Storage trait definitions

use crate::graph::{
    CommentLink, ContentNode, Discussion, DiscussionId, NodeId, NodeKind, PeerReview,
    ReviewAggregate, SharedCategory, SharedTag, TaggedEdge, VoteCounts, VoteKind, VoteRecord,
};
use chrono::{DateTime, Utc};
use rusqlite::ErrorCode;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    /// Another writer holds the lock; the caller may retry
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    /// A row holds a value this version cannot interpret
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StorageError::Conflict(err.to_string())
            }
            _ => StorageError::Database(err),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One open transaction against the backing store.
///
/// Every read and write of a public core operation goes through a single
/// `StoreTx`. Dropping it without calling [`StoreTx::commit`] rolls back.
pub trait StoreTx {
    /// Make every write in this transaction durable
    fn commit(self: Box<Self>) -> StorageResult<()>;

    // === Nodes ===

    fn insert_node(&self, node: &ContentNode) -> StorageResult<()>;

    fn load_node(&self, id: &NodeId) -> StorageResult<Option<ContentNode>>;

    /// Persist author-editable fields (properties, public credit, updated_at)
    fn update_node(&self, node: &ContentNode) -> StorageResult<()>;

    /// Overwrite one dimension's counters
    fn write_counts(
        &self,
        id: &NodeId,
        kind: VoteKind,
        counts: VoteCounts,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Delete the node row and every row keyed by it (votes, tags, shared
    /// edges, reviews, preferences, its discussion row). Comment nodes of its
    /// discussion are separate nodes and must be deleted by the caller.
    fn delete_node(&self, id: &NodeId) -> StorageResult<bool>;

    fn list_nodes(&self, kind: Option<NodeKind>, limit: usize) -> StorageResult<Vec<ContentNode>>;

    // === Votes ===

    fn load_vote(&self, node_id: &NodeId, user_id: &str, kind: VoteKind) -> StorageResult<Option<VoteRecord>>;

    fn upsert_vote(&self, vote: &VoteRecord) -> StorageResult<()>;

    fn delete_vote(&self, node_id: &NodeId, user_id: &str, kind: VoteKind) -> StorageResult<bool>;

    /// Totals derived from the vote records themselves
    fn tally_votes(&self, node_id: &NodeId, kind: VoteKind) -> StorageResult<VoteCounts>;

    // === Words ===

    fn word_node(&self, word: &str) -> StorageResult<Option<NodeId>>;

    fn index_word(&self, word: &str, node_id: &NodeId) -> StorageResult<()>;

    // === Tags ===

    /// Remove the node's TAGGED edges and every SHARED_TAG edge touching it
    fn clear_tags(&self, node_id: &NodeId) -> StorageResult<usize>;

    fn insert_tag(&self, tag: &TaggedEdge) -> StorageResult<()>;

    fn tags_of(&self, node_id: &NodeId) -> StorageResult<Vec<TaggedEdge>>;

    fn nodes_tagged_with(&self, word: &str) -> StorageResult<Vec<TaggedEdge>>;

    /// Create the edge, or add its strength onto an existing one
    fn merge_shared_tag(&self, edge: &SharedTag) -> StorageResult<()>;

    fn shared_tags_of(&self, node_id: &NodeId) -> StorageResult<Vec<SharedTag>>;

    // === Categories ===

    /// Remove the node's CATEGORIZED edges and every SHARED_CATEGORY edge touching it
    fn clear_categories(&self, node_id: &NodeId) -> StorageResult<usize>;

    fn insert_category(&self, node_id: &NodeId, category_id: &NodeId) -> StorageResult<()>;

    fn categories_of(&self, node_id: &NodeId) -> StorageResult<Vec<NodeId>>;

    fn nodes_in_category(&self, category_id: &NodeId) -> StorageResult<Vec<NodeId>>;

    fn merge_shared_category(&self, edge: &SharedCategory) -> StorageResult<()>;

    fn shared_categories_of(&self, node_id: &NodeId) -> StorageResult<Vec<SharedCategory>>;

    /// COMPOSED_OF edges: category → words
    fn set_category_words(&self, category_id: &NodeId, words: &[String]) -> StorageResult<()>;

    fn category_words(&self, category_id: &NodeId) -> StorageResult<Vec<String>>;

    /// Categories composed of the given word
    fn categories_using_word(&self, word: &str) -> StorageResult<Vec<NodeId>>;

    /// Definition nodes written for the given word
    fn definitions_of(&self, word: &str) -> StorageResult<Vec<NodeId>>;

    // === Peer reviews ===

    fn load_review(&self, evidence_id: &NodeId, user_id: &str) -> StorageResult<Option<PeerReview>>;

    fn insert_review(&self, review: &PeerReview) -> StorageResult<()>;

    fn reviews_of(&self, evidence_id: &NodeId) -> StorageResult<Vec<PeerReview>>;

    fn save_review_aggregate(&self, aggregate: &ReviewAggregate) -> StorageResult<()>;

    fn load_review_aggregate(&self, evidence_id: &NodeId) -> StorageResult<Option<ReviewAggregate>>;

    // === Discussions ===

    fn insert_discussion(&self, discussion: &Discussion) -> StorageResult<()>;

    fn discussion_for(&self, node_id: &NodeId) -> StorageResult<Option<Discussion>>;

    fn load_discussion(&self, id: &DiscussionId) -> StorageResult<Option<Discussion>>;

    fn link_comment(&self, link: &CommentLink) -> StorageResult<()>;

    fn comment_link(&self, comment_id: &NodeId) -> StorageResult<Option<CommentLink>>;

    fn comments_in(&self, discussion_id: &DiscussionId) -> StorageResult<Vec<CommentLink>>;

    // === Visibility preferences ===

    fn set_visibility(&self, user_id: &str, node_id: &NodeId, visible: bool) -> StorageResult<()>;

    fn visibility_for(&self, user_id: &str, node_id: &NodeId) -> StorageResult<Option<bool>>;
}

/// Trait for graph storage backends
///
/// Implementations must be thread-safe (Send + Sync) to support
/// concurrent access from multiple threads.
pub trait GraphStore: Send + Sync {
    /// Open a write transaction. Writers are serialized by the store.
    fn begin(&self) -> StorageResult<Box<dyn StoreTx + '_>>;

    /// Open a read transaction giving a consistent snapshot
    fn read(&self) -> StorageResult<Box<dyn StoreTx + '_>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}

/// Run `f` inside a write transaction, committing only if it returns `Ok`
pub fn in_transaction<T, E>(
    store: &dyn GraphStore,
    f: impl FnOnce(&dyn StoreTx) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<StorageError>,
{
    let tx = store.begin()?;
    let value = f(tx.as_ref())?;
    tx.commit()?;
    Ok(value)
}

/// Run `f` against a read snapshot
pub fn read_only<T, E>(store: &dyn GraphStore, f: impl FnOnce(&dyn StoreTx) -> Result<T, E>) -> Result<T, E>
where
    E: From<StorageError>,
{
    let tx = store.read()?;
    f(tx.as_ref())
}
