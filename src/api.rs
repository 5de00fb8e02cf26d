//! Transport-independent API layer.
//!
//! `ContentApi` is the single entry point for consumer-facing operations.
//! Transports (CLI, HTTP, direct embedding) call `ContentApi` methods and
//! never reach into the ledger, synthesizer or store directly.
//!
//! Every public write runs as one store transaction. Collaborator calls are
//! made before the transaction opens (lookups, keyword extraction) or after
//! it commits (word registration, discussion attachment), never while it is
//! held.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::collab::{
    CategoryService, CollaboratorError, DiscussionService, KeywordExtractor, NoKeywords, StoreCatalog, WordService,
};
use crate::config::PolicyConfig;
use crate::discussion::{AttachOutcome, DiscussionAttacher, StoreDiscussions};
use crate::error::{require_non_blank, TallyError, TallyResult};
use crate::graph::{
    build_node, normalize_word, text_key, AggregateCounts, CommentLink, ContentNode, Dependency, Discussion,
    DiscussionId, Keyword, NodeId, NodeKind, NodeRecord, PeerReview, ReviewAggregate, ReviewScores, SharedCategory,
    SharedTag, Structure, TagSource, TaggedEdge, VoteKind, VoteStatus,
};
use crate::ledger::{load_required, VoteLedger};
use crate::policy::ThresholdPolicy;
use crate::review::PeerReviewAggregator;
use crate::storage::{in_transaction, read_only, GraphStore, StoreTx};
use crate::synth::{CategorySyncReport, RelationshipSynthesizer, TagSyncReport};

/// A freshly created node and what happened around it
#[derive(Debug, Clone)]
pub struct CreatedNode {
    pub node: ContentNode,
    /// `None` for kinds without discussions, or when attachment failed
    pub discussion: Option<DiscussionId>,
    /// Non-fatal problems with best-effort collaborators
    pub warnings: Vec<String>,
}

/// An edited node and any non-fatal collaborator problems along the way
#[derive(Debug, Clone)]
pub struct UpdatedNode {
    pub node: ContentNode,
    pub warnings: Vec<String>,
}

/// Author edits to an existing node. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub text: Option<String>,
    pub public_credit: Option<bool>,
    /// Full replacement of the author-supplied keywords
    pub keywords: Option<Vec<Keyword>>,
    /// Full replacement of the category set
    pub categories: Option<Vec<NodeId>>,
}

/// A comment in thread order
#[derive(Debug, Clone)]
pub struct CommentView {
    pub node: ContentNode,
    pub parent_comment_id: Option<NodeId>,
    /// Above the comment visibility floor
    pub visible: bool,
}

/// Single entry point for all consumer-facing operations.
#[derive(Clone)]
pub struct ContentApi {
    store: Arc<dyn GraphStore>,
    policy: ThresholdPolicy,
    ledger: VoteLedger,
    synth: RelationshipSynthesizer,
    reviews: PeerReviewAggregator,
    attacher: DiscussionAttacher,
    words: Arc<dyn WordService>,
    categories: Arc<dyn CategoryService>,
    extractor: Arc<dyn KeywordExtractor>,
}

impl ContentApi {
    /// Create an API over `store` with store-backed collaborators and no
    /// keyword extraction.
    pub fn new(store: Arc<dyn GraphStore>, config: Arc<PolicyConfig>) -> Self {
        let policy = ThresholdPolicy::new(config);
        let catalog = Arc::new(StoreCatalog::new(store.clone()));
        Self {
            ledger: VoteLedger::new(policy.clone()),
            synth: RelationshipSynthesizer::new(policy.clone()),
            reviews: PeerReviewAggregator::new(policy.clone()),
            attacher: DiscussionAttacher::new(Arc::new(StoreDiscussions::new(store.clone()))),
            words: catalog.clone(),
            categories: catalog,
            extractor: Arc::new(NoKeywords),
            policy,
            store,
        }
    }

    pub fn with_keyword_extractor(mut self, extractor: Arc<dyn KeywordExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_word_service(mut self, words: Arc<dyn WordService>) -> Self {
        self.words = words;
        self
    }

    pub fn with_category_service(mut self, categories: Arc<dyn CategoryService>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_discussion_service(mut self, discussions: Arc<dyn DiscussionService>) -> Self {
        self.attacher = DiscussionAttacher::new(discussions);
        self
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    // --- Node lifecycle ---

    /// Validate and create a node, synthesize its tag and category edges in
    /// the same transaction, then register newly extracted words and attach
    /// its discussion.
    pub async fn create(&self, record: &dyn NodeRecord) -> TallyResult<CreatedNode> {
        record.validate(self.policy.config())?;
        let mut warnings = Vec::new();

        let categories = match record.as_categorizable() {
            Some(categorizable) => {
                let ids = self.synth.check_category_count(categorizable.category_ids())?;
                self.verify_categories(&ids).await?;
                Some(ids)
            }
            None => None,
        };
        let keywords = match record.as_taggable() {
            Some(taggable) => {
                self.verify_user_words(taggable.keywords()).await?;
                let mut keywords = taggable.keywords().to_vec();
                keywords.extend(self.extract(taggable.extraction_text(), &mut warnings).await);
                Some(keywords)
            }
            None => None,
        };

        let node = in_transaction(self.store.as_ref(), |tx| {
            self.insert_record(tx, record, keywords.as_deref(), categories.as_deref())
        })?;
        info!(id = %node.id, kind = %node.kind, author = %node.created_by, "node created");

        if let Some(keywords) = &keywords {
            self.register_extracted_words(keywords, record.author(), &mut warnings)
                .await;
        }

        let discussion = match record.as_discussable() {
            Some(discussable) => {
                let outcome = self
                    .attacher
                    .attach(&node.id, node.kind, record.author(), discussable.initial_comment())
                    .await;
                if let AttachOutcome::Failed(reason) = &outcome {
                    warnings.push(format!("discussion not attached: {}", reason));
                }
                outcome.discussion_id().cloned()
            }
            None => None,
        };

        Ok(CreatedNode {
            node,
            discussion,
            warnings,
        })
    }

    /// Apply author edits. Changing the text of a taggable node re-extracts
    /// its keywords; keyword and category sets are replaced, not merged.
    pub async fn update(&self, node_id: &NodeId, update: NodeUpdate) -> TallyResult<UpdatedNode> {
        let current = read_only(self.store.as_ref(), |tx| load_required(tx, node_id))?;
        let caps = self.policy.capabilities(current.kind);

        let text = match &update.text {
            Some(text) => {
                require_non_blank("text", text)?;
                let key = text_key(current.kind).ok_or_else(|| {
                    TallyError::validation(format!("{} text cannot be edited", current.kind))
                })?;
                Some((key, text.trim().to_string()))
            }
            None => None,
        };

        let categories = match &update.categories {
            Some(_) if !caps.categorizable => {
                return Err(TallyError::Capability {
                    kind: current.kind,
                    operation: "categorization",
                })
            }
            Some(ids) => {
                let ids = self.synth.check_category_count(ids)?;
                self.verify_categories(&ids).await?;
                Some(ids)
            }
            None => None,
        };

        let mut warnings = Vec::new();
        let keywords = match (&update.keywords, &text) {
            (Some(_), _) if !caps.taggable => {
                return Err(TallyError::Capability {
                    kind: current.kind,
                    operation: "tagging",
                })
            }
            (None, None) => None,
            (None, Some(_)) if !caps.taggable => None,
            (given, _) => {
                let mut keywords = match given {
                    Some(given) => {
                        self.verify_user_words(given).await?;
                        given.clone()
                    }
                    None => self.user_keywords(node_id)?,
                };
                let source_text = match &text {
                    Some((_, new_text)) => new_text.clone(),
                    None => text_key(current.kind)
                        .and_then(|key| current.text_property(key))
                        .unwrap_or_default()
                        .to_string(),
                };
                keywords.extend(self.extract(&source_text, &mut warnings).await);
                Some(keywords)
            }
        };

        let node = in_transaction(self.store.as_ref(), |tx| {
            let mut node = load_required(tx, node_id)?;
            if let Some((key, value)) = &text {
                node.properties.insert(key.to_string(), value.as_str().into());
            }
            if let Some(public_credit) = update.public_credit {
                node.public_credit = public_credit;
            }
            node.updated_at = chrono::Utc::now();
            tx.update_node(&node)?;

            if let Some(keywords) = &keywords {
                self.synth.sync_tags(tx, node_id, keywords)?;
            }
            if let Some(ids) = &categories {
                self.synth.sync_categories(tx, node_id, ids)?;
            }
            load_required(tx, node_id)
        })?;

        if let Some(keywords) = &keywords {
            self.register_extracted_words(keywords, &node.created_by, &mut warnings)
                .await;
        }
        Ok(UpdatedNode { node, warnings })
    }

    /// Delete a node with its votes, edges, reviews and discussion thread.
    ///
    /// Words and categories still referenced by other nodes are refused.
    /// Returns `false` when the node did not exist.
    pub fn delete(&self, node_id: &NodeId) -> TallyResult<bool> {
        in_transaction(self.store.as_ref(), |tx| {
            let Some(node) = tx.load_node(node_id)? else {
                return Ok(false);
            };
            ensure_unreferenced(tx, &node)?;

            if let Some(discussion) = tx.discussion_for(node_id)? {
                for link in tx.comments_in(&discussion.id)? {
                    tx.delete_node(&link.comment_id)?;
                }
            }
            if node.kind == NodeKind::Comment {
                for reply in replies_to(tx, node_id)? {
                    tx.delete_node(&reply)?;
                }
            }
            tx.delete_node(node_id)?;
            info!(id = %node_id, kind = %node.kind, "node deleted");
            Ok(true)
        })
    }

    // --- Votes ---

    /// Cast or change a vote. A node whose kind is not `kind` counts as absent.
    pub fn vote(
        &self,
        kind: NodeKind,
        node_id: &NodeId,
        user_id: &str,
        vote_kind: VoteKind,
        is_positive: bool,
    ) -> TallyResult<AggregateCounts> {
        in_transaction(self.store.as_ref(), |tx| {
            expect_kind(tx, kind, node_id)?;
            self.ledger.vote(tx, node_id, user_id, vote_kind, is_positive)
        })
    }

    pub fn remove_vote(
        &self,
        kind: NodeKind,
        node_id: &NodeId,
        user_id: &str,
        vote_kind: VoteKind,
    ) -> TallyResult<AggregateCounts> {
        in_transaction(self.store.as_ref(), |tx| {
            expect_kind(tx, kind, node_id)?;
            self.ledger.remove_vote(tx, node_id, user_id, vote_kind)
        })
    }

    pub fn get_vote_status(&self, kind: NodeKind, node_id: &NodeId, user_id: &str) -> TallyResult<Option<VoteStatus>> {
        read_only(self.store.as_ref(), |tx| match tx.load_node(node_id)? {
            Some(node) if node.kind == kind => Ok(Some(self.ledger.get_status(tx, node_id, user_id)?)),
            _ => Ok(None),
        })
    }

    pub fn get_votes(&self, kind: NodeKind, node_id: &NodeId) -> TallyResult<Option<AggregateCounts>> {
        read_only(self.store.as_ref(), |tx| {
            Ok(tx
                .load_node(node_id)?
                .filter(|node| node.kind == kind)
                .map(|node| node.counts()))
        })
    }

    // --- Derived relationships ---

    pub async fn sync_tags(&self, node_id: &NodeId, tags: &[Keyword]) -> TallyResult<TagSyncReport> {
        self.verify_user_words(tags).await?;
        in_transaction(self.store.as_ref(), |tx| self.synth.sync_tags(tx, node_id, tags))
    }

    pub async fn sync_categories(&self, node_id: &NodeId, category_ids: &[NodeId]) -> TallyResult<CategorySyncReport> {
        let ids = self.synth.check_category_count(category_ids)?;
        self.verify_categories(&ids).await?;
        in_transaction(self.store.as_ref(), |tx| self.synth.sync_categories(tx, node_id, &ids))
    }

    // --- Peer review ---

    pub fn submit_peer_review(
        &self,
        evidence_id: &NodeId,
        user_id: &str,
        scores: ReviewScores,
        comments: Option<String>,
    ) -> TallyResult<PeerReview> {
        in_transaction(self.store.as_ref(), |tx| {
            self.reviews.submit_review(tx, evidence_id, user_id, scores, comments)
        })
    }

    // --- Visibility ---

    /// Record a user's explicit show/hide choice for a node
    pub fn set_visibility(&self, user_id: &str, node_id: &NodeId, visible: bool) -> TallyResult<()> {
        require_non_blank("user_id", user_id)?;
        in_transaction(self.store.as_ref(), |tx| {
            load_required(tx, node_id)?;
            tx.set_visibility(user_id, node_id, visible)?;
            Ok(())
        })
    }

    /// Whether the node is shown. A user's own preference wins over the
    /// vote-derived default.
    pub fn is_visible(&self, node_id: &NodeId, user_id: Option<&str>) -> TallyResult<bool> {
        read_only(self.store.as_ref(), |tx| {
            let node = load_required(tx, node_id)?;
            if let Some(user_id) = user_id {
                if let Some(visible) = tx.visibility_for(user_id, node_id)? {
                    return Ok(visible);
                }
            }
            Ok(self.visible_by_votes(&node))
        })
    }

    // --- Reads ---

    pub fn get_node(&self, node_id: &NodeId) -> TallyResult<Option<ContentNode>> {
        read_only(self.store.as_ref(), |tx| Ok(tx.load_node(node_id)?))
    }

    pub fn list_nodes(&self, kind: Option<NodeKind>, limit: usize) -> TallyResult<Vec<ContentNode>> {
        read_only(self.store.as_ref(), |tx| Ok(tx.list_nodes(kind, limit)?))
    }

    pub fn discussion_for(&self, node_id: &NodeId) -> TallyResult<Option<Discussion>> {
        read_only(self.store.as_ref(), |tx| Ok(tx.discussion_for(node_id)?))
    }

    /// Comments on a node's discussion, oldest first
    pub fn comments(&self, node_id: &NodeId) -> TallyResult<Vec<CommentView>> {
        read_only(self.store.as_ref(), |tx| {
            let Some(discussion) = tx.discussion_for(node_id)? else {
                return Ok(Vec::new());
            };
            let mut views = Vec::new();
            for link in tx.comments_in(&discussion.id)? {
                let Some(node) = tx.load_node(&link.comment_id)? else {
                    continue;
                };
                views.push(CommentView {
                    visible: self.visible_by_votes(&node),
                    parent_comment_id: link.parent_comment_id,
                    node,
                });
            }
            Ok(views)
        })
    }

    pub fn tags(&self, node_id: &NodeId) -> TallyResult<Vec<TaggedEdge>> {
        read_only(self.store.as_ref(), |tx| self.synth.tags(tx, node_id))
    }

    pub fn categories(&self, node_id: &NodeId) -> TallyResult<Vec<NodeId>> {
        read_only(self.store.as_ref(), |tx| self.synth.categories(tx, node_id))
    }

    pub fn shared_tags(&self, node_id: &NodeId) -> TallyResult<Vec<SharedTag>> {
        read_only(self.store.as_ref(), |tx| self.synth.shared_tags(tx, node_id))
    }

    pub fn shared_categories(&self, node_id: &NodeId) -> TallyResult<Vec<SharedCategory>> {
        read_only(self.store.as_ref(), |tx| self.synth.shared_categories(tx, node_id))
    }

    pub fn review_aggregate(&self, evidence_id: &NodeId) -> TallyResult<Option<ReviewAggregate>> {
        read_only(self.store.as_ref(), |tx| self.reviews.aggregate(tx, evidence_id))
    }

    pub fn reviews(&self, evidence_id: &NodeId) -> TallyResult<Vec<PeerReview>> {
        read_only(self.store.as_ref(), |tx| self.reviews.reviews(tx, evidence_id))
    }

    // --- Internals ---

    fn insert_record(
        &self,
        tx: &dyn StoreTx,
        record: &dyn NodeRecord,
        keywords: Option<&[Keyword]>,
        categories: Option<&[NodeId]>,
    ) -> TallyResult<ContentNode> {
        for dependency in record.dependencies() {
            self.check_dependency(tx, &dependency)?;
        }

        let structure = record.structure();
        if let Structure::Word(word) = &structure {
            if tx.word_node(word)?.is_some() {
                return Err(TallyError::validation(format!("word '{}' already exists", word)));
            }
        }

        let node = build_node(record);
        tx.insert_node(&node)?;

        match structure {
            Structure::Standalone => {}
            Structure::Word(word) => tx.index_word(&word, &node.id)?,
            Structure::Category(words) => tx.set_category_words(&node.id, &words)?,
            Structure::Comment {
                discussion_id,
                parent_comment_id,
            } => tx.link_comment(&CommentLink {
                comment_id: node.id.clone(),
                discussion_id,
                parent_comment_id,
            })?,
        }

        if let Some(keywords) = keywords {
            self.synth.sync_tags(tx, &node.id, keywords)?;
        }
        if let Some(categories) = categories {
            self.synth.sync_categories(tx, &node.id, categories)?;
        }
        Ok(node)
    }

    fn check_dependency(&self, tx: &dyn StoreTx, dependency: &Dependency) -> TallyResult<()> {
        match dependency {
            Dependency::Node {
                id,
                kinds,
                approved,
                role,
            } => match tx.load_node(id)? {
                Some(node) if kinds.contains(&node.kind) && (!approved || self.policy.has_passed_inclusion(node.inclusion.net)) => {
                    Ok(())
                }
                Some(_) if *approved => Err(TallyError::DependencyNotFound(format!(
                    "{} {} is not an approved {}",
                    role,
                    id,
                    kind_list(kinds)
                ))),
                _ => Err(TallyError::DependencyNotFound(format!(
                    "{} {} is not an existing {}",
                    role,
                    id,
                    kind_list(kinds)
                ))),
            },
            Dependency::Word { word, approved } => {
                let node = match tx.word_node(word)? {
                    Some(id) => tx.load_node(&id)?,
                    None => None,
                };
                match node {
                    Some(node) if !approved || self.policy.has_passed_inclusion(node.inclusion.net) => Ok(()),
                    Some(_) => Err(TallyError::DependencyNotFound(format!(
                        "word '{}' has not passed inclusion",
                        word
                    ))),
                    None => Err(TallyError::DependencyNotFound(format!("word '{}' does not exist", word))),
                }
            }
            Dependency::Discussion { id, parent_comment } => {
                if tx.load_discussion(id)?.is_none() {
                    return Err(TallyError::DependencyNotFound(format!("discussion {} does not exist", id)));
                }
                if let Some(parent) = parent_comment {
                    match tx.comment_link(parent)? {
                        Some(link) if &link.discussion_id == id => {}
                        _ => {
                            return Err(TallyError::DependencyNotFound(format!(
                                "comment {} is not part of discussion {}",
                                parent, id
                            )))
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// User-supplied words must name existing Word nodes
    async fn verify_user_words(&self, keywords: &[Keyword]) -> TallyResult<()> {
        for keyword in keywords.iter().filter(|k| k.source == TagSource::User) {
            let word = normalize_word(&keyword.word);
            require_non_blank("keyword", &word)?;
            let exists = self
                .words
                .word_exists(&word)
                .await
                .map_err(|e| collaborator_failure("word service", e))?;
            if !exists {
                return Err(TallyError::DependencyNotFound(format!("word '{}' does not exist", word)));
            }
        }
        Ok(())
    }

    async fn verify_categories(&self, ids: &[NodeId]) -> TallyResult<()> {
        for id in ids {
            let net = self
                .categories
                .category_exists(id)
                .await
                .map_err(|e| collaborator_failure("category service", e))?;
            match net {
                Some(net) if self.policy.has_passed_inclusion(net) => {}
                Some(_) => {
                    return Err(TallyError::DependencyNotFound(format!(
                        "category {} has not passed inclusion",
                        id
                    )))
                }
                None => return Err(TallyError::DependencyNotFound(format!("category {} does not exist", id))),
            }
        }
        Ok(())
    }

    /// Best-effort keyword extraction. Malformed keywords are dropped; words
    /// are not looked up here.
    async fn extract(&self, text: &str, warnings: &mut Vec<String>) -> Vec<Keyword> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let extracted = match self.extractor.extract_keywords(text).await {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!("keyword extraction failed: {}", e);
                warnings.push(format!("keyword extraction failed: {}", e));
                return Vec::new();
            }
        };

        let mut keywords = Vec::with_capacity(extracted.len());
        for keyword in extracted {
            let word = normalize_word(&keyword.word);
            if word.is_empty() || !keyword.frequency.is_finite() || keyword.frequency <= 0.0 {
                warn!(word = %keyword.word, frequency = keyword.frequency, "discarding malformed extracted keyword");
                continue;
            }
            keywords.push(Keyword::new(word, keyword.frequency, TagSource::Extracted));
        }
        keywords
    }

    /// Give extracted words without a Word node an unvoted one, so they start
    /// contributing once approved. Runs only after the owning write committed.
    async fn register_extracted_words(&self, keywords: &[Keyword], author: &str, warnings: &mut Vec<String>) {
        for keyword in keywords.iter().filter(|k| k.source == TagSource::Extracted) {
            match self.words.word_exists(&keyword.word).await {
                Ok(true) => {}
                Ok(false) => {
                    if let Err(e) = self.words.ensure_word_node(&keyword.word, author).await {
                        warn!(word = %keyword.word, "could not create word node: {}", e);
                        warnings.push(format!("word '{}' not created: {}", keyword.word, e));
                    }
                }
                Err(e) => warn!(word = %keyword.word, "word lookup failed: {}", e),
            }
        }
    }

    fn user_keywords(&self, node_id: &NodeId) -> TallyResult<Vec<Keyword>> {
        let tags = read_only(self.store.as_ref(), |tx| self.synth.tags(tx, node_id))?;
        Ok(tags
            .into_iter()
            .filter(|tag| tag.source == TagSource::User)
            .map(|tag| Keyword::new(tag.word, tag.frequency, TagSource::User))
            .collect())
    }

    /// Vote-derived visibility: the inclusion net for kinds that have one,
    /// otherwise the content net, against the kind's floor
    fn visible_by_votes(&self, node: &ContentNode) -> bool {
        let net = if self.policy.capabilities(node.kind).inclusion {
            node.inclusion.net
        } else {
            node.content.net
        };
        self.policy.is_content_visible(net, node.kind)
    }
}

fn expect_kind(tx: &dyn StoreTx, kind: NodeKind, node_id: &NodeId) -> TallyResult<ContentNode> {
    let node = load_required(tx, node_id)?;
    if node.kind != kind {
        return Err(TallyError::NotFound(node_id.clone()));
    }
    Ok(node)
}

fn ensure_unreferenced(tx: &dyn StoreTx, node: &ContentNode) -> TallyResult<()> {
    match node.kind {
        NodeKind::Word => {
            let word = node.text_property("word").unwrap_or_default();
            if !tx.nodes_tagged_with(word)?.is_empty()
                || !tx.categories_using_word(word)?.is_empty()
                || !tx.definitions_of(word)?.is_empty()
            {
                return Err(TallyError::validation(format!("word '{}' is still in use", word)));
            }
        }
        NodeKind::Category => {
            if !tx.nodes_in_category(&node.id)?.is_empty() {
                return Err(TallyError::validation(format!("category {} is still in use", node.id)));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Every comment below `comment_id` in its thread
fn replies_to(tx: &dyn StoreTx, comment_id: &NodeId) -> TallyResult<Vec<NodeId>> {
    let Some(link) = tx.comment_link(comment_id)? else {
        return Ok(Vec::new());
    };
    let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for entry in tx.comments_in(&link.discussion_id)? {
        if let Some(parent) = entry.parent_comment_id {
            children.entry(parent).or_default().push(entry.comment_id);
        }
    }

    let mut replies = Vec::new();
    let mut pending = vec![comment_id.clone()];
    while let Some(id) = pending.pop() {
        for child in children.remove(&id).unwrap_or_default() {
            pending.push(child.clone());
            replies.push(child);
        }
    }
    Ok(replies)
}

fn kind_list(kinds: &[NodeKind]) -> String {
    kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(" or ")
}

fn collaborator_failure(service: &str, err: CollaboratorError) -> TallyError {
    match err {
        CollaboratorError::Core(e) => e,
        CollaboratorError::Storage(e) => TallyError::Storage(e),
        other => TallyError::DependencyNotFound(format!("{} could not be consulted: {}", service, other)),
    }
}
