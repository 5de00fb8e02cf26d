//! Collaborator services the core consumes.
//!
//! Words, categories, keyword extraction and discussions are owned by other
//! services in a full deployment. The core reaches them only through these
//! traits; the defaults here are backed by the same store or do nothing.

use crate::error::TallyError;
use crate::graph::{normalize_word, ContentNode, Discussion, DiscussionId, Keyword, NodeId, NodeKind};
use crate::storage::{in_transaction, read_only, GraphStore, StorageError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a collaborator service
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {reason}")]
    Unavailable { service: &'static str, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] TallyError),
}

#[async_trait]
pub trait WordService: Send + Sync {
    async fn word_exists(&self, word: &str) -> Result<bool, CollaboratorError>;

    /// Return the Word node for `word`, creating an unvoted one with its
    /// discussion if missing
    async fn ensure_word_node(&self, word: &str, created_by: &str) -> Result<NodeId, CollaboratorError>;
}

#[async_trait]
pub trait CategoryService: Send + Sync {
    /// Inclusion net of the category, or `None` when it does not exist
    async fn category_exists(&self, id: &NodeId) -> Result<Option<i64>, CollaboratorError>;
}

#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    async fn extract_keywords(&self, text: &str) -> Result<Vec<Keyword>, CollaboratorError>;
}

/// Discussion a service attached to a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscussionHandle {
    pub id: DiscussionId,
    /// False when the node already had a discussion
    pub created: bool,
}

#[async_trait]
pub trait DiscussionService: Send + Sync {
    /// Attach a discussion to the node unless it has one, seeding it with
    /// `initial_comment` when given
    async fn create_discussion(
        &self,
        node_id: &NodeId,
        node_kind: NodeKind,
        created_by: &str,
        initial_comment: Option<&str>,
    ) -> Result<DiscussionHandle, CollaboratorError>;
}

/// Word and category lookups against the local store
#[derive(Clone)]
pub struct StoreCatalog {
    store: Arc<dyn GraphStore>,
}

impl StoreCatalog {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    fn ensure_word(&self, word: &str, created_by: &str) -> Result<NodeId, CollaboratorError> {
        in_transaction(self.store.as_ref(), |tx| {
            if let Some(id) = tx.word_node(word)? {
                return Ok(id);
            }
            let node = ContentNode::new(NodeKind::Word, created_by).with_property("word", word);
            tx.insert_node(&node)?;
            tx.index_word(word, &node.id)?;
            tx.insert_discussion(&Discussion::new(node.id.clone(), NodeKind::Word, created_by))?;
            tracing::info!(word, id = %node.id, "word node created");
            Ok(node.id)
        })
    }
}

#[async_trait]
impl WordService for StoreCatalog {
    async fn word_exists(&self, word: &str) -> Result<bool, CollaboratorError> {
        let word = normalize_word(word);
        read_only(self.store.as_ref(), |tx| Ok(tx.word_node(&word)?.is_some()))
    }

    async fn ensure_word_node(&self, word: &str, created_by: &str) -> Result<NodeId, CollaboratorError> {
        let word = normalize_word(word);
        if word.is_empty() {
            return Err(TallyError::validation("word must not be empty").into());
        }
        self.ensure_word(&word, created_by)
    }
}

#[async_trait]
impl CategoryService for StoreCatalog {
    async fn category_exists(&self, id: &NodeId) -> Result<Option<i64>, CollaboratorError> {
        read_only(self.store.as_ref(), |tx| {
            Ok(tx
                .load_node(id)?
                .filter(|node| node.kind == NodeKind::Category)
                .map(|node| node.inclusion.net))
        })
    }
}

/// Extractor that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKeywords;

#[async_trait]
impl KeywordExtractor for NoKeywords {
    async fn extract_keywords(&self, _text: &str) -> Result<Vec<Keyword>, CollaboratorError> {
        Ok(Vec::new())
    }
}
