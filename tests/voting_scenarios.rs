//! Vote ledger behaviour through the public API
//!
//! Counter consistency under random vote sequences, inclusion gating of
//! content votes, visibility floors, concurrent writers and persistence.
//!
//! Run with: `cargo test --test voting_scenarios`

mod common;

use common::{api, approve, approved_statement};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use tally::{
    AggregateCounts, CommentDraft, ContentApi, GraphStore, NodeId, NodeKind, OpenStore, PolicyConfig, SqliteStore,
    Stance, StatementDraft, TallyError, VoteCounts, VoteKind,
};

// ============================================================================
// Helpers
// ============================================================================

async fn statement(api: &ContentApi) -> NodeId {
    api.create(&StatementDraft::new("Rivers flow downhill", "author"))
        .await
        .unwrap()
        .node
        .id
}

fn counts(api: &ContentApi, kind: NodeKind, id: &NodeId) -> AggregateCounts {
    api.get_votes(kind, id).unwrap().unwrap()
}

/// Expected counters for one dimension, from a model of who voted which way
fn expected(model: &HashMap<(usize, VoteKind), bool>, kind: VoteKind) -> VoteCounts {
    let positive = model.iter().filter(|((_, k), up)| *k == kind && **up).count() as i64;
    let negative = model.iter().filter(|((_, k), up)| *k == kind && !**up).count() as i64;
    VoteCounts::new(positive, negative)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn statement_lifecycle_scenario() {
    let api = api();
    let n = statement(&api).await;

    let after = api.vote(NodeKind::Statement, &n, "u1", VoteKind::Inclusion, true).unwrap();
    assert_eq!(after.inclusion.net, 1);

    let after = api.vote(NodeKind::Statement, &n, "u1", VoteKind::Content, true).unwrap();
    assert_eq!(after.content.net, 1);

    let after = api.remove_vote(NodeKind::Statement, &n, "u1", VoteKind::Inclusion).unwrap();
    assert_eq!(after.inclusion.net, 0);

    let err = api
        .vote(NodeKind::Statement, &n, "u2", VoteKind::Content, true)
        .unwrap_err();
    assert!(matches!(err, TallyError::ThresholdNotMet(_)));

    // Content tallies survive the node dropping back below inclusion
    assert_eq!(counts(&api, NodeKind::Statement, &n).content, VoteCounts::new(1, 0));
}

#[tokio::test]
async fn content_voting_opens_once_inclusion_passes() {
    let api = api();
    let n = statement(&api).await;

    let err = api
        .vote(NodeKind::Statement, &n, "u1", VoteKind::Content, false)
        .unwrap_err();
    assert!(matches!(err, TallyError::ThresholdNotMet(_)));

    api.vote(NodeKind::Statement, &n, "u1", VoteKind::Inclusion, false).unwrap();
    api.vote(NodeKind::Statement, &n, "u2", VoteKind::Inclusion, true).unwrap();
    // net 0 is not above the threshold
    assert!(api
        .vote(NodeKind::Statement, &n, "u1", VoteKind::Content, false)
        .is_err());

    api.vote(NodeKind::Statement, &n, "u3", VoteKind::Inclusion, true).unwrap();
    let after = api.vote(NodeKind::Statement, &n, "u1", VoteKind::Content, false).unwrap();
    assert_eq!(after.content, VoteCounts::new(0, 1));
}

#[tokio::test]
async fn remove_after_vote_restores_counters() {
    let api = api();
    let n = approved_statement(&api, "Ice floats").await;
    api.vote(NodeKind::Statement, &n, "u1", VoteKind::Content, false).unwrap();
    let before = counts(&api, NodeKind::Statement, &n);

    api.vote(NodeKind::Statement, &n, "u2", VoteKind::Inclusion, true).unwrap();
    api.vote(NodeKind::Statement, &n, "u2", VoteKind::Content, true).unwrap();
    api.remove_vote(NodeKind::Statement, &n, "u2", VoteKind::Content).unwrap();
    api.remove_vote(NodeKind::Statement, &n, "u2", VoteKind::Inclusion).unwrap();

    assert_eq!(counts(&api, NodeKind::Statement, &n), before);

    // Withdrawing a vote that was never cast is a no-op
    let again = api.remove_vote(NodeKind::Statement, &n, "u9", VoteKind::Inclusion).unwrap();
    assert_eq!(again, before);
}

#[tokio::test]
async fn same_direction_revote_is_idempotent() {
    let api = api();
    let n = statement(&api).await;

    let first = api.vote(NodeKind::Statement, &n, "u1", VoteKind::Inclusion, true).unwrap();
    let second = api.vote(NodeKind::Statement, &n, "u1", VoteKind::Inclusion, true).unwrap();
    assert_eq!(first, second);
    assert_eq!(second.inclusion, VoteCounts::new(1, 0));

    // Flipping moves the vote rather than adding one
    let flipped = api.vote(NodeKind::Statement, &n, "u1", VoteKind::Inclusion, false).unwrap();
    assert_eq!(flipped.inclusion, VoteCounts::new(0, 1));
}

#[tokio::test]
async fn random_vote_sequences_keep_counters_consistent() {
    let api = api();
    let n = statement(&api).await;
    let mut rng = StdRng::seed_from_u64(42);
    let mut model: HashMap<(usize, VoteKind), bool> = HashMap::new();

    for step in 0..400 {
        let user = rng.gen_range(0..6);
        let user_id = format!("user-{}", user);
        let kind = if rng.gen_bool(0.5) {
            VoteKind::Inclusion
        } else {
            VoteKind::Content
        };

        if rng.gen_range(0..4) == 0 {
            api.remove_vote(NodeKind::Statement, &n, &user_id, kind).unwrap();
            model.remove(&(user, kind));
        } else {
            let up = rng.gen_bool(0.5);
            let gated = kind == VoteKind::Content && expected(&model, VoteKind::Inclusion).net <= 0;
            match api.vote(NodeKind::Statement, &n, &user_id, kind, up) {
                Ok(_) => {
                    assert!(!gated, "step {}: content vote accepted below inclusion", step);
                    model.insert((user, kind), up);
                }
                Err(TallyError::ThresholdNotMet(_)) => assert!(gated, "step {}: vote wrongly gated", step),
                Err(e) => panic!("step {}: unexpected error {}", step, e),
            }
        }

        let stored = counts(&api, NodeKind::Statement, &n);
        for (dimension, actual) in [
            (VoteKind::Inclusion, stored.inclusion),
            (VoteKind::Content, stored.content),
        ] {
            assert_eq!(actual.net, actual.positive - actual.negative, "step {}", step);
            assert_eq!(actual, expected(&model, dimension), "step {} ({})", step, dimension);
        }
    }
}

#[tokio::test]
async fn vote_status_reports_each_dimension() {
    let api = api();
    let n = approved_statement(&api, "Salt dissolves").await;
    api.vote(NodeKind::Statement, &n, "u1", VoteKind::Inclusion, false).unwrap();
    api.vote(NodeKind::Statement, &n, "u1", VoteKind::Content, true).unwrap();

    let status = api.get_vote_status(NodeKind::Statement, &n, "u1").unwrap().unwrap();
    assert_eq!(status.inclusion_status, Stance::Disagree);
    assert_eq!(status.content_status, Stance::Agree);
    // approver +1, u1 -1
    assert_eq!(status.counts.inclusion, VoteCounts::new(1, 1));

    let stranger = api.get_vote_status(NodeKind::Statement, &n, "u2").unwrap().unwrap();
    assert_eq!(stranger.inclusion_status, Stance::None);
    assert_eq!(stranger.content_status, Stance::None);
}

// ============================================================================
// Kind capabilities
// ============================================================================

#[tokio::test]
async fn comments_take_content_votes_only() {
    let api = api();
    let created = api
        .create(&StatementDraft::new("Fire is hot", "author"))
        .await
        .unwrap();
    let comment = api
        .create(&CommentDraft::new(created.discussion.unwrap(), "Usually", "u1"))
        .await
        .unwrap()
        .node
        .id;

    let err = api
        .vote(NodeKind::Comment, &comment, "u2", VoteKind::Inclusion, true)
        .unwrap_err();
    assert!(matches!(err, TallyError::Capability { .. }));

    // No inclusion dimension, so nothing gates the content vote
    let after = api.vote(NodeKind::Comment, &comment, "u2", VoteKind::Content, true).unwrap();
    assert_eq!(after.content.net, 1);

    let err = api
        .remove_vote(NodeKind::Comment, &comment, "u2", VoteKind::Inclusion)
        .unwrap_err();
    assert!(matches!(err, TallyError::Capability { .. }));
}

#[tokio::test]
async fn words_and_questions_have_no_content_dimension() {
    let api = api();
    let word = common::approved_word(&api, "gravity").await;
    let err = api.vote(NodeKind::Word, &word, "u1", VoteKind::Content, true).unwrap_err();
    assert!(matches!(err, TallyError::Capability { .. }));

    let question = api
        .create(&tally::OpenQuestionDraft::new("Why is the sky blue?", "u1"))
        .await
        .unwrap()
        .node
        .id;
    approve(&api, NodeKind::OpenQuestion, &question);
    let err = api
        .vote(NodeKind::OpenQuestion, &question, "u2", VoteKind::Content, true)
        .unwrap_err();
    assert!(matches!(err, TallyError::Capability { .. }));
}

#[tokio::test]
async fn voting_on_missing_node_is_not_found() {
    let api = api();
    let err = api
        .vote(NodeKind::Statement, &NodeId::from_string("ghost"), "u1", VoteKind::Inclusion, true)
        .unwrap_err();
    assert!(matches!(err, TallyError::NotFound(_)));

    let err = api
        .vote(NodeKind::Statement, &NodeId::from_string(""), "u1", VoteKind::Inclusion, true)
        .unwrap_err();
    assert!(matches!(err, TallyError::Validation(_)));
}

// ============================================================================
// Visibility
// ============================================================================

#[tokio::test]
async fn visibility_follows_floors() {
    let api = api();
    let created = api
        .create(&StatementDraft::new("The moon is cheese", "author"))
        .await
        .unwrap();
    let n = created.node.id;
    let comment = api
        .create(&CommentDraft::new(created.discussion.unwrap(), "Nonsense", "u0"))
        .await
        .unwrap()
        .node
        .id;

    for i in 0..5 {
        api.vote(NodeKind::Statement, &n, &format!("u{}", i), VoteKind::Inclusion, false)
            .unwrap();
    }
    // net -5 is still on the floor
    assert!(api.is_visible(&n, None).unwrap());
    api.vote(NodeKind::Statement, &n, "u5", VoteKind::Inclusion, false).unwrap();
    assert!(!api.is_visible(&n, None).unwrap());
    api.set_visibility("u7", &n, true).unwrap();
    assert!(api.is_visible(&n, Some("u7")).unwrap());

    for i in 0..4 {
        api.vote(NodeKind::Comment, &comment, &format!("u{}", i), VoteKind::Content, false)
            .unwrap();
    }
    let views = api.comments(&n).unwrap();
    assert_eq!(views.len(), 1);
    assert!(!views[0].visible);
}

// ============================================================================
// Concurrency and persistence
// ============================================================================

#[tokio::test]
async fn concurrent_voters_are_all_counted() {
    let api = api();
    let n = statement(&api).await;

    std::thread::scope(|scope| {
        for i in 0..8 {
            let api = api.clone();
            let n = n.clone();
            scope.spawn(move || {
                api.vote(NodeKind::Statement, &n, &format!("voter-{}", i), VoteKind::Inclusion, true)
                    .unwrap();
            });
        }
    });

    assert_eq!(counts(&api, NodeKind::Statement, &n).inclusion, VoteCounts::new(8, 0));
}

#[tokio::test]
async fn votes_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("tally.db");

    let n = {
        let store: Arc<dyn GraphStore> = Arc::new(SqliteStore::open(&path).unwrap());
        let api = ContentApi::new(store, Arc::new(PolicyConfig::default()));
        let n = statement(&api).await;
        api.vote(NodeKind::Statement, &n, "u1", VoteKind::Inclusion, true).unwrap();
        api.vote(NodeKind::Statement, &n, "u1", VoteKind::Content, true).unwrap();
        n
    };

    let store: Arc<dyn GraphStore> = Arc::new(SqliteStore::open(&path).unwrap());
    let api = ContentApi::new(store, Arc::new(PolicyConfig::default()));
    let stored = counts(&api, NodeKind::Statement, &n);
    assert_eq!(stored.inclusion, VoteCounts::new(1, 0));
    assert_eq!(stored.content, VoteCounts::new(1, 0));
    assert!(api.discussion_for(&n).unwrap().is_some());
}

#[tokio::test]
async fn custom_threshold_applies() {
    let config = PolicyConfig::from_yaml_str("inclusion_threshold: 2\n").unwrap();
    let store: Arc<dyn GraphStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let api = ContentApi::new(store, Arc::new(config));
    let n = statement(&api).await;

    api.vote(NodeKind::Statement, &n, "u1", VoteKind::Inclusion, true).unwrap();
    api.vote(NodeKind::Statement, &n, "u2", VoteKind::Inclusion, true).unwrap();
    assert!(api
        .vote(NodeKind::Statement, &n, "u1", VoteKind::Content, true)
        .is_err());

    api.vote(NodeKind::Statement, &n, "u3", VoteKind::Inclusion, true).unwrap();
    assert!(api
        .vote(NodeKind::Statement, &n, "u1", VoteKind::Content, true)
        .is_ok());
}
