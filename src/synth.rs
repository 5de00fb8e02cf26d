//! RelationshipSynthesizer: keeps SHARED_TAG and SHARED_CATEGORY edges
//! consistent with the tag and category sets of content nodes.
//!
//! Both sets are written with full-replace semantics. Every derived edge
//! touching the node is removed and recomputed from the new set against
//! the current sets of all other nodes, so writing the same set twice yields
//! the same strengths.

use crate::error::{TallyError, TallyResult};
use crate::graph::{
    normalize_word, ContentNode, Keyword, NodeId, NodeKind, NodePair, SharedCategory, SharedTag, TagSource,
    TaggedEdge,
};
use crate::ledger::load_required;
use crate::policy::ThresholdPolicy;
use crate::storage::StoreTx;
use tracing::debug;

/// What a tag sync wrote
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSyncReport {
    pub tagged: usize,
    pub shared: usize,
    /// Extracted keywords dropped because their word is not an approved Word
    pub skipped: Vec<String>,
}

/// What a category sync wrote
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategorySyncReport {
    pub categorized: usize,
    pub shared: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RelationshipSynthesizer {
    policy: ThresholdPolicy,
}

impl RelationshipSynthesizer {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self { policy }
    }

    /// Replace the node's tag set and recompute its SHARED_TAG edges.
    pub fn sync_tags(&self, tx: &dyn StoreTx, node_id: &NodeId, keywords: &[Keyword]) -> TallyResult<TagSyncReport> {
        let node = load_required(tx, node_id)?;
        if !self.policy.capabilities(node.kind).taggable {
            return Err(TallyError::Capability {
                kind: node.kind,
                operation: "tagging",
            });
        }

        let mut report = TagSyncReport::default();
        let mut accepted = Vec::new();
        for keyword in merge_keywords(keywords)? {
            if self.word_is_approved(tx, &keyword.word)? {
                accepted.push(keyword);
            } else if keyword.source == TagSource::Extracted {
                debug!(node = %node_id, word = %keyword.word, "skipping unapproved extracted keyword");
                report.skipped.push(keyword.word);
            } else {
                return Err(TallyError::DependencyNotFound(format!(
                    "word '{}' does not exist or has not passed inclusion",
                    keyword.word
                )));
            }
        }

        let cleared = tx.clear_tags(node_id)?;

        for keyword in accepted {
            let edge = TaggedEdge {
                node_id: node_id.clone(),
                word: keyword.word,
                frequency: keyword.frequency,
                source: keyword.source,
            };
            for other in tx.nodes_tagged_with(&edge.word)? {
                let Some(pair) = NodePair::new(node_id.clone(), other.node_id.clone()) else {
                    continue;
                };
                tx.merge_shared_tag(&SharedTag {
                    pair,
                    word: edge.word.clone(),
                    strength: edge.frequency * other.frequency,
                })?;
                report.shared += 1;
            }
            tx.insert_tag(&edge)?;
            report.tagged += 1;
        }

        debug!(
            node = %node_id,
            cleared,
            tagged = report.tagged,
            shared = report.shared,
            skipped = report.skipped.len(),
            "tags synchronized"
        );
        Ok(report)
    }

    /// Replace the node's category set and recompute its SHARED_CATEGORY edges.
    pub fn sync_categories(
        &self,
        tx: &dyn StoreTx,
        node_id: &NodeId,
        category_ids: &[NodeId],
    ) -> TallyResult<CategorySyncReport> {
        let ids = self.check_category_count(category_ids)?;
        let node = load_required(tx, node_id)?;
        if !self.policy.capabilities(node.kind).categorizable {
            return Err(TallyError::Capability {
                kind: node.kind,
                operation: "categorization",
            });
        }
        for id in &ids {
            self.require_approved_category(tx, id)?;
        }

        let cleared = tx.clear_categories(node_id)?;

        let mut report = CategorySyncReport::default();
        for category_id in ids {
            for other in tx.nodes_in_category(&category_id)? {
                let Some(pair) = NodePair::new(node_id.clone(), other) else {
                    continue;
                };
                tx.merge_shared_category(&SharedCategory {
                    pair,
                    category_id: category_id.clone(),
                    strength: 1.0,
                })?;
                report.shared += 1;
            }
            tx.insert_category(node_id, &category_id)?;
            report.categorized += 1;
        }

        debug!(
            node = %node_id,
            cleared,
            categorized = report.categorized,
            shared = report.shared,
            "categories synchronized"
        );
        Ok(report)
    }

    /// Collapse duplicates and enforce the per-node category limit
    pub fn check_category_count(&self, category_ids: &[NodeId]) -> TallyResult<Vec<NodeId>> {
        let mut ids: Vec<NodeId> = Vec::with_capacity(category_ids.len());
        for id in category_ids {
            if id.is_blank() {
                return Err(TallyError::validation("category id must not be empty"));
            }
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        let max = self.policy.config().max_categories;
        if ids.len() > max {
            return Err(TallyError::validation(format!(
                "at most {} categories allowed, got {}",
                max,
                ids.len()
            )));
        }
        Ok(ids)
    }

    pub fn tags(&self, tx: &dyn StoreTx, node_id: &NodeId) -> TallyResult<Vec<TaggedEdge>> {
        Ok(tx.tags_of(node_id)?)
    }

    pub fn categories(&self, tx: &dyn StoreTx, node_id: &NodeId) -> TallyResult<Vec<NodeId>> {
        Ok(tx.categories_of(node_id)?)
    }

    pub fn shared_tags(&self, tx: &dyn StoreTx, node_id: &NodeId) -> TallyResult<Vec<SharedTag>> {
        Ok(tx.shared_tags_of(node_id)?)
    }

    pub fn shared_categories(&self, tx: &dyn StoreTx, node_id: &NodeId) -> TallyResult<Vec<SharedCategory>> {
        Ok(tx.shared_categories_of(node_id)?)
    }

    fn word_is_approved(&self, tx: &dyn StoreTx, word: &str) -> TallyResult<bool> {
        let Some(id) = tx.word_node(word)? else {
            return Ok(false);
        };
        Ok(tx
            .load_node(&id)?
            .is_some_and(|node| self.approved(&node, NodeKind::Word)))
    }

    fn require_approved_category(&self, tx: &dyn StoreTx, id: &NodeId) -> TallyResult<()> {
        match tx.load_node(id)? {
            Some(node) if self.approved(&node, NodeKind::Category) => Ok(()),
            _ => Err(TallyError::DependencyNotFound(format!(
                "category {} does not exist or has not passed inclusion",
                id
            ))),
        }
    }

    fn approved(&self, node: &ContentNode, kind: NodeKind) -> bool {
        node.kind == kind && self.policy.has_passed_inclusion(node.inclusion.net)
    }
}

/// Normalize words and merge repeats by summing their frequency.
///
/// A word given by the author keeps the `User` source even when extraction
/// also produced it.
pub fn merge_keywords(keywords: &[Keyword]) -> TallyResult<Vec<Keyword>> {
    let mut merged: Vec<Keyword> = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        let word = normalize_word(&keyword.word);
        if word.is_empty() {
            return Err(TallyError::validation("keyword must not be empty"));
        }
        if !keyword.frequency.is_finite() || keyword.frequency <= 0.0 {
            return Err(TallyError::validation(format!(
                "keyword '{}' has invalid frequency {}",
                word, keyword.frequency
            )));
        }
        match merged.iter_mut().find(|k| k.word == word) {
            Some(existing) => {
                existing.frequency += keyword.frequency;
                if keyword.source == TagSource::User {
                    existing.source = TagSource::User;
                }
            }
            None => merged.push(Keyword::new(word, keyword.frequency, keyword.source)),
        }
    }
    Ok(merged)
}
