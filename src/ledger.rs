//! VoteLedger: per-(node, user, kind) votes and the counters derived from them.
//!
//! Counters on the node row are a cache. After every change the ledger
//! re-tallies the vote records for the affected dimension and overwrites the
//! cached totals in the same transaction.

use crate::error::{require_non_blank, TallyError, TallyResult};
use crate::graph::{
    AggregateCounts, ContentNode, NodeId, Stance, VoteDirection, VoteKind, VoteRecord, VoteStatus,
};
use crate::policy::ThresholdPolicy;
use crate::storage::StoreTx;
use chrono::Utc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct VoteLedger {
    policy: ThresholdPolicy,
}

impl VoteLedger {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self { policy }
    }

    /// Cast or change `user_id`'s vote on one dimension of a node.
    pub fn vote(
        &self,
        tx: &dyn StoreTx,
        node_id: &NodeId,
        user_id: &str,
        kind: VoteKind,
        is_positive: bool,
    ) -> TallyResult<AggregateCounts> {
        require_non_blank("user_id", user_id)?;
        let node = load_required(tx, node_id)?;
        self.policy.can_vote(node.kind, kind, node.inclusion.net)?;

        let direction = VoteDirection::from_positive(is_positive);
        if let Some(existing) = tx.load_vote(node_id, user_id, kind)? {
            if existing.direction == direction {
                debug!(node = %node_id, user = user_id, %kind, "repeat vote, nothing to do");
                return Ok(node.counts());
            }
        }

        tx.upsert_vote(&VoteRecord::new(node_id.clone(), user_id, kind, direction))?;
        let counts = recount(tx, &node, kind)?;
        debug!(
            node = %node_id,
            user = user_id,
            %kind,
            positive = is_positive,
            net = counts.get(kind).net,
            "vote recorded"
        );
        Ok(counts)
    }

    /// Withdraw a vote. Removing a vote that was never cast changes nothing.
    pub fn remove_vote(
        &self,
        tx: &dyn StoreTx,
        node_id: &NodeId,
        user_id: &str,
        kind: VoteKind,
    ) -> TallyResult<AggregateCounts> {
        require_non_blank("user_id", user_id)?;
        let node = load_required(tx, node_id)?;
        if !self.policy.capabilities(node.kind).supports(kind) {
            return Err(TallyError::Capability {
                kind: node.kind,
                operation: match kind {
                    VoteKind::Inclusion => "inclusion voting",
                    VoteKind::Content => "content voting",
                },
            });
        }

        if !tx.delete_vote(node_id, user_id, kind)? {
            return Ok(node.counts());
        }
        let counts = recount(tx, &node, kind)?;
        debug!(node = %node_id, user = user_id, %kind, net = counts.get(kind).net, "vote removed");
        Ok(counts)
    }

    pub fn get_status(&self, tx: &dyn StoreTx, node_id: &NodeId, user_id: &str) -> TallyResult<VoteStatus> {
        require_non_blank("user_id", user_id)?;
        let node = load_required(tx, node_id)?;
        let inclusion = tx.load_vote(node_id, user_id, VoteKind::Inclusion)?;
        let content = tx.load_vote(node_id, user_id, VoteKind::Content)?;
        Ok(VoteStatus {
            inclusion_status: Stance::of(inclusion.as_ref()),
            content_status: Stance::of(content.as_ref()),
            counts: node.counts(),
        })
    }

    pub fn get_counts(&self, tx: &dyn StoreTx, node_id: &NodeId) -> TallyResult<AggregateCounts> {
        Ok(load_required(tx, node_id)?.counts())
    }
}

pub(crate) fn load_required(tx: &dyn StoreTx, node_id: &NodeId) -> TallyResult<ContentNode> {
    require_non_blank("node_id", node_id.as_str())?;
    tx.load_node(node_id)?
        .ok_or_else(|| TallyError::NotFound(node_id.clone()))
}

/// Re-derive one dimension from the vote records and cache it on the node
fn recount(tx: &dyn StoreTx, node: &ContentNode, kind: VoteKind) -> TallyResult<AggregateCounts> {
    let counts = tx.tally_votes(&node.id, kind)?;
    tx.write_counts(&node.id, kind, counts, Utc::now())?;

    let mut all = node.counts();
    match kind {
        VoteKind::Inclusion => all.inclusion = counts,
        VoteKind::Content => all.content = counts,
    }
    Ok(all)
}
