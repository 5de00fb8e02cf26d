//! ThresholdPolicy: which kinds vote how, and when a node counts as
//! included or visible. Pure functions over an immutable [`PolicyConfig`].

use crate::config::PolicyConfig;
use crate::error::{TallyError, TallyResult};
use crate::graph::{NodeKind, VoteKind};
use std::sync::Arc;

/// What a node kind supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub inclusion: bool,
    pub content: bool,
    pub taggable: bool,
    pub categorizable: bool,
    pub discussable: bool,
    pub peer_review: bool,
}

impl Capabilities {
    pub fn supports(&self, vote_kind: VoteKind) -> bool {
        match vote_kind {
            VoteKind::Inclusion => self.inclusion,
            VoteKind::Content => self.content,
        }
    }
}

const fn caps(
    inclusion: bool,
    content: bool,
    taggable: bool,
    categorizable: bool,
    discussable: bool,
    peer_review: bool,
) -> Capabilities {
    Capabilities {
        inclusion,
        content,
        taggable,
        categorizable,
        discussable,
        peer_review,
    }
}

/// Static capability table
pub fn capabilities(kind: NodeKind) -> Capabilities {
    //                                 incl   content tags   cats   discuss review
    match kind {
        NodeKind::Word => caps(true, false, false, false, true, false),
        NodeKind::Definition => caps(true, true, false, false, true, false),
        NodeKind::Statement => caps(true, true, true, true, true, false),
        NodeKind::OpenQuestion => caps(true, false, true, true, true, false),
        NodeKind::Answer => caps(true, true, true, true, true, false),
        // Evidence is judged through peer review instead of content votes
        NodeKind::Evidence => caps(true, false, true, true, true, true),
        NodeKind::Category => caps(true, false, false, false, true, false),
        NodeKind::Comment => caps(false, true, false, false, false, false),
    }
}

/// Threshold rules, parameterised by configuration
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    config: Arc<PolicyConfig>,
}

impl ThresholdPolicy {
    pub fn new(config: Arc<PolicyConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn capabilities(&self, kind: NodeKind) -> Capabilities {
        capabilities(kind)
    }

    pub fn has_passed_inclusion(&self, net_votes: i64) -> bool {
        net_votes > self.config.inclusion_threshold
    }

    pub fn visibility_floor(&self, kind: NodeKind) -> i64 {
        match kind {
            NodeKind::Comment => self.config.visibility.comment_floor,
            _ => self.config.visibility.content_floor,
        }
    }

    pub fn is_content_visible(&self, net_votes: i64, kind: NodeKind) -> bool {
        net_votes >= self.visibility_floor(kind)
    }

    /// Check whether a vote of `vote_kind` may be cast on a node of `kind`
    /// whose inclusion net is `inclusion_net`.
    ///
    /// Content votes are gated on inclusion only for kinds that have an
    /// inclusion dimension at all.
    pub fn can_vote(&self, kind: NodeKind, vote_kind: VoteKind, inclusion_net: i64) -> TallyResult<()> {
        let caps = self.capabilities(kind);
        if !caps.supports(vote_kind) {
            return Err(TallyError::Capability {
                kind,
                operation: match vote_kind {
                    VoteKind::Inclusion => "inclusion voting",
                    VoteKind::Content => "content voting",
                },
            });
        }
        if vote_kind == VoteKind::Content && caps.inclusion && !self.has_passed_inclusion(inclusion_net) {
            return Err(TallyError::ThresholdNotMet(format!(
                "content voting requires inclusion net above {}, current net is {}",
                self.config.inclusion_threshold, inclusion_net
            )));
        }
        Ok(())
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::new(Arc::new(PolicyConfig::default()))
    }
}
