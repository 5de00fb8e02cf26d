//! Common test utilities for the voting scenarios
//!
//! Builds in-memory APIs, seeds approved words and categories, and provides
//! collaborator doubles for extraction and discussion failures.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tally::{
    CategoryDraft, CollaboratorError, ContentApi, DiscussionHandle, DiscussionService, GraphStore, Keyword,
    KeywordExtractor, NodeId, NodeKind, OpenStore, PolicyConfig, SqliteStore, StatementDraft, TagSource, VoteKind,
    WordDraft,
};

pub fn memory_store() -> Arc<dyn GraphStore> {
    Arc::new(SqliteStore::open_in_memory().expect("in-memory store"))
}

pub fn api() -> ContentApi {
    ContentApi::new(memory_store(), Arc::new(PolicyConfig::default()))
}

/// Cast one positive inclusion vote so the node passes the default threshold
pub fn approve(api: &ContentApi, kind: NodeKind, id: &NodeId) {
    api.vote(kind, id, "approver", VoteKind::Inclusion, true)
        .expect("approval vote");
}

pub async fn approved_word(api: &ContentApi, word: &str) -> NodeId {
    let id = api
        .create(&WordDraft::new(word, "seed"))
        .await
        .expect("create word")
        .node
        .id;
    approve(api, NodeKind::Word, &id);
    id
}

pub async fn approved_category(api: &ContentApi, words: &[&str]) -> NodeId {
    for word in words {
        approved_word(api, word).await;
    }
    let draft = CategoryDraft::new(words.iter().map(|w| w.to_string()).collect(), "seed");
    let id = api.create(&draft).await.expect("create category").node.id;
    approve(api, NodeKind::Category, &id);
    id
}

pub async fn approved_statement(api: &ContentApi, text: &str) -> NodeId {
    let id = api
        .create(&StatementDraft::new(text, "seed"))
        .await
        .expect("create statement")
        .node
        .id;
    approve(api, NodeKind::Statement, &id);
    id
}

pub fn user_keyword(word: &str, frequency: f64) -> Keyword {
    Keyword::new(word, frequency, TagSource::User)
}

/// Extractor that always returns the same keywords and counts its calls
#[derive(Default)]
pub struct FixedExtractor {
    keywords: Vec<Keyword>,
    pub calls: AtomicUsize,
}

impl FixedExtractor {
    pub fn new(words: &[(&str, f64)]) -> Self {
        Self {
            keywords: words
                .iter()
                .map(|(word, frequency)| Keyword::new(*word, *frequency, TagSource::Extracted))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeywordExtractor for FixedExtractor {
    async fn extract_keywords(&self, _text: &str) -> Result<Vec<Keyword>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.keywords.clone())
    }
}

/// Extractor whose backing service is down
pub struct FailingExtractor;

#[async_trait]
impl KeywordExtractor for FailingExtractor {
    async fn extract_keywords(&self, _text: &str) -> Result<Vec<Keyword>, CollaboratorError> {
        Err(CollaboratorError::Unavailable {
            service: "keyword extractor",
            reason: "timed out".to_string(),
        })
    }
}

/// Discussion service whose backing service is down
pub struct FailingDiscussions;

#[async_trait]
impl DiscussionService for FailingDiscussions {
    async fn create_discussion(
        &self,
        _node_id: &NodeId,
        _node_kind: NodeKind,
        _created_by: &str,
        _initial_comment: Option<&str>,
    ) -> Result<DiscussionHandle, CollaboratorError> {
        Err(CollaboratorError::Unavailable {
            service: "discussions",
            reason: "connection refused".to_string(),
        })
    }
}
