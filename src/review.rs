//! PeerReviewAggregator: evidence-only reviews and their running averages.
//!
//! Evidence never takes content votes; the weighted `overall_score` of its
//! reviews stands in for that signal.

use crate::config::ReviewWeights;
use crate::error::{require_non_blank, TallyError, TallyResult};
use crate::graph::{NodeId, PeerReview, ReviewAggregate, ReviewScores};
use crate::ledger::load_required;
use crate::policy::ThresholdPolicy;
use crate::storage::StoreTx;
use chrono::Utc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct PeerReviewAggregator {
    policy: ThresholdPolicy,
}

impl PeerReviewAggregator {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self { policy }
    }

    pub fn submit_review(
        &self,
        tx: &dyn StoreTx,
        evidence_id: &NodeId,
        user_id: &str,
        scores: ReviewScores,
        comments: Option<String>,
    ) -> TallyResult<PeerReview> {
        require_non_blank("user_id", user_id)?;
        if let Some((dimension, score)) = scores.out_of_range() {
            return Err(TallyError::validation(format!(
                "{} score must be between 1 and 5, got {}",
                dimension, score
            )));
        }

        let evidence = load_required(tx, evidence_id)?;
        if !self.policy.capabilities(evidence.kind).peer_review {
            return Err(TallyError::Capability {
                kind: evidence.kind,
                operation: "peer review",
            });
        }
        if !self.policy.has_passed_inclusion(evidence.inclusion.net) {
            return Err(TallyError::ThresholdNotMet(format!(
                "evidence {} must pass inclusion before review (net {})",
                evidence_id, evidence.inclusion.net
            )));
        }
        if tx.load_review(evidence_id, user_id)?.is_some() {
            return Err(TallyError::DuplicateReview {
                evidence_id: evidence_id.clone(),
                user_id: user_id.to_string(),
            });
        }

        let review = PeerReview {
            evidence_id: evidence_id.clone(),
            user_id: user_id.to_string(),
            scores,
            comments: comments.filter(|c| !c.trim().is_empty()),
            created_at: Utc::now(),
        };
        tx.insert_review(&review)?;

        let reviews = tx.reviews_of(evidence_id)?;
        if let Some(aggregate) = aggregate(evidence_id, &reviews, &self.policy.config().review_weights) {
            debug!(
                evidence = %evidence_id,
                reviews = aggregate.review_count,
                overall = aggregate.overall_score,
                "review aggregate updated"
            );
            tx.save_review_aggregate(&aggregate)?;
        }
        Ok(review)
    }

    pub fn aggregate(&self, tx: &dyn StoreTx, evidence_id: &NodeId) -> TallyResult<Option<ReviewAggregate>> {
        Ok(tx.load_review_aggregate(evidence_id)?)
    }

    pub fn review_of(&self, tx: &dyn StoreTx, evidence_id: &NodeId, user_id: &str) -> TallyResult<Option<PeerReview>> {
        Ok(tx.load_review(evidence_id, user_id)?)
    }

    pub fn reviews(&self, tx: &dyn StoreTx, evidence_id: &NodeId) -> TallyResult<Vec<PeerReview>> {
        Ok(tx.reviews_of(evidence_id)?)
    }
}

/// Averages and weighted overall score; `None` when there are no reviews
pub fn aggregate(evidence_id: &NodeId, reviews: &[PeerReview], weights: &ReviewWeights) -> Option<ReviewAggregate> {
    if reviews.is_empty() {
        return None;
    }
    let n = reviews.len() as f64;
    let mean = |score: fn(&ReviewScores) -> u8| reviews.iter().map(|r| f64::from(score(&r.scores))).sum::<f64>() / n;

    let avg_quality = mean(|s: &ReviewScores| s.quality);
    let avg_independence = mean(|s: &ReviewScores| s.independence);
    let avg_relevance = mean(|s: &ReviewScores| s.relevance);

    Some(ReviewAggregate {
        evidence_id: evidence_id.clone(),
        avg_quality,
        avg_independence,
        avg_relevance,
        overall_score: avg_quality * weights.quality
            + avg_independence * weights.independence
            + avg_relevance * weights.relevance,
        review_count: reviews.len() as i64,
    })
}
