//! Derived relationships, peer review and collaborator failures
//!
//! Run with: `cargo test --test relationships`

mod common;

use common::{
    api, approve, approved_category, approved_statement, approved_word, user_keyword, FailingDiscussions,
    FailingExtractor, FixedExtractor,
};
use std::sync::Arc;
use tally::{
    AnswerDraft, CategoryDraft, DefinitionDraft, EvidenceDraft, NodeId, NodeKind, NodeUpdate, OpenQuestionDraft, ReviewScores,
    StatementDraft, TagSource, TallyError, VoteKind,
};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ============================================================================
// SHARED_TAG
// ============================================================================

#[tokio::test]
async fn shared_tag_strength_is_product_of_frequencies() {
    let api = api();
    approved_word(&api, "x").await;

    let a = api
        .create(&StatementDraft::new("A", "u1").with_keywords(vec![user_keyword("x", 2.0)]))
        .await
        .unwrap()
        .node
        .id;
    let b = api
        .create(&StatementDraft::new("B", "u2").with_keywords(vec![user_keyword("x", 3.0)]))
        .await
        .unwrap()
        .node
        .id;

    let shared = api.shared_tags(&a).unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].word, "x");
    assert_eq!(shared[0].pair.other(&a), Some(&b));
    assert!(approx(shared[0].strength, 6.0));

    // The same edge is visible from either end
    assert!(approx(api.shared_tags(&b).unwrap()[0].strength, 6.0));
}

#[tokio::test]
async fn resync_resets_and_recomputes() {
    let api = api();
    approved_word(&api, "x").await;
    let a = api
        .create(&StatementDraft::new("A", "u1").with_keywords(vec![user_keyword("x", 2.0)]))
        .await
        .unwrap()
        .node
        .id;
    let b = api
        .create(&StatementDraft::new("B", "u2").with_keywords(vec![user_keyword("x", 3.0)]))
        .await
        .unwrap()
        .node
        .id;

    for _ in 0..3 {
        api.sync_tags(&a, &[user_keyword("x", 2.0)]).await.unwrap();
    }
    let shared = api.shared_tags(&b).unwrap();
    assert_eq!(shared.len(), 1);
    assert!(approx(shared[0].strength, 6.0));

    api.sync_tags(&a, &[user_keyword("x", 4.0)]).await.unwrap();
    assert!(approx(api.shared_tags(&b).unwrap()[0].strength, 12.0));

    let report = api.sync_tags(&a, &[]).await.unwrap();
    assert_eq!(report.tagged, 0);
    assert!(api.shared_tags(&b).unwrap().is_empty());
    assert!(api.tags(&a).unwrap().is_empty());
}

#[tokio::test]
async fn shared_tags_accumulate_per_word() {
    let api = api();
    approved_word(&api, "x").await;
    approved_word(&api, "y").await;
    let tags = vec![user_keyword("x", 1.0), user_keyword("y", 0.5)];
    let a = api
        .create(&StatementDraft::new("A", "u1").with_keywords(tags.clone()))
        .await
        .unwrap()
        .node
        .id;
    api.create(&StatementDraft::new("B", "u2").with_keywords(tags))
        .await
        .unwrap();

    let mut shared = api.shared_tags(&a).unwrap();
    shared.sort_by(|l, r| l.word.cmp(&r.word));
    assert_eq!(shared.len(), 2);
    assert!(approx(shared[0].strength, 1.0));
    assert!(approx(shared[1].strength, 0.25));
}

#[tokio::test]
async fn user_keywords_must_be_approved_words() {
    let api = api();
    let err = api
        .create(&StatementDraft::new("A", "u1").with_keywords(vec![user_keyword("nowhere", 1.0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::DependencyNotFound(_)));

    api.create(&tally::WordDraft::new("pending", "u1")).await.unwrap();
    let err = api
        .create(&StatementDraft::new("A", "u1").with_keywords(vec![user_keyword("pending", 1.0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::DependencyNotFound(_)));

    // Neither failed create left a statement behind
    assert!(api.list_nodes(Some(NodeKind::Statement), 10).unwrap().is_empty());
}

#[tokio::test]
async fn tagging_is_refused_for_untaggable_kinds() {
    let api = api();
    let word = approved_word(&api, "x").await;
    let err = api.sync_tags(&word, &[user_keyword("x", 1.0)]).await.unwrap_err();
    assert!(matches!(err, TallyError::Capability { .. }));
}

// ============================================================================
// Categories
// ============================================================================

#[tokio::test]
async fn shared_category_links_members() {
    let api = api();
    let science = approved_category(&api, &["physics", "chemistry"]).await;

    let a = api
        .create(&StatementDraft::new("A", "u1").with_categories(vec![science.clone()]))
        .await
        .unwrap()
        .node
        .id;
    let b = api
        .create(&StatementDraft::new("B", "u2").with_categories(vec![science.clone()]))
        .await
        .unwrap()
        .node
        .id;

    let shared = api.shared_categories(&a).unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].category_id, science);
    assert_eq!(shared[0].pair.other(&a), Some(&b));
    assert!(approx(shared[0].strength, 1.0));

    api.sync_categories(&a, &[science.clone()]).await.unwrap();
    assert!(approx(api.shared_categories(&b).unwrap()[0].strength, 1.0));
}

#[tokio::test]
async fn more_than_three_categories_is_rejected() {
    let api = api();
    let mut categories = Vec::new();
    for word in ["alpha", "beta", "gamma", "delta"] {
        categories.push(approved_category(&api, &[word]).await);
    }

    let err = api
        .create(&StatementDraft::new("Too many", "u1").with_categories(categories.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::Validation(_)));

    let n = api
        .create(&StatementDraft::new("Two", "u1").with_categories(categories[..2].to_vec()))
        .await
        .unwrap()
        .node
        .id;
    let err = api.sync_categories(&n, &categories).await.unwrap_err();
    assert!(matches!(err, TallyError::Validation(_)));

    let mut kept = api.categories(&n).unwrap();
    kept.sort();
    let mut expected = categories[..2].to_vec();
    expected.sort();
    assert_eq!(kept, expected);
}

#[tokio::test]
async fn categories_must_be_approved() {
    let api = api();
    approved_word(&api, "music").await;
    let pending = api
        .create(&CategoryDraft::new(vec!["music".into()], "u1"))
        .await
        .unwrap()
        .node
        .id;

    let err = api
        .create(&StatementDraft::new("A", "u1").with_categories(vec![pending.clone()]))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::DependencyNotFound(_)));

    approve(&api, NodeKind::Category, &pending);
    api.create(&StatementDraft::new("A", "u1").with_categories(vec![pending]))
        .await
        .unwrap();
}

#[tokio::test]
async fn category_words_must_be_approved() {
    let api = api();
    api.create(&tally::WordDraft::new("jazz", "u1")).await.unwrap();
    let err = api
        .create(&CategoryDraft::new(vec!["jazz".into()], "u1"))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::DependencyNotFound(_)));
}

#[tokio::test]
async fn words_in_use_cannot_be_deleted() {
    let api = api();
    let word = approved_word(&api, "x").await;
    let n = api
        .create(&StatementDraft::new("A", "u1").with_keywords(vec![user_keyword("x", 1.0)]))
        .await
        .unwrap()
        .node
        .id;

    let err = api.delete(&word).unwrap_err();
    assert!(matches!(err, TallyError::Validation(_)));

    assert!(api.delete(&n).unwrap());
    assert!(api.delete(&word).unwrap());
}

#[tokio::test]
async fn defined_words_cannot_be_deleted() {
    let api = api();
    let word = api
        .create(&tally::WordDraft::new("water", "u1"))
        .await
        .unwrap()
        .node
        .id;
    let definition = api
        .create(&DefinitionDraft::new("Water", "Clear liquid", "u2"))
        .await
        .unwrap()
        .node
        .id;

    let err = api.delete(&word).unwrap_err();
    assert!(matches!(err, TallyError::Validation(_)));
    assert!(api.get_node(&word).unwrap().is_some());

    assert!(api.delete(&definition).unwrap());
    assert!(api.delete(&word).unwrap());
}

// ============================================================================
// Dependencies between kinds
// ============================================================================

#[tokio::test]
async fn answers_need_an_approved_question() {
    let api = api();
    let question = api
        .create(&OpenQuestionDraft::new("Is light a wave?", "u1"))
        .await
        .unwrap()
        .node
        .id;

    let err = api
        .create(&AnswerDraft::new(question.clone(), "Sometimes", "u2"))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::DependencyNotFound(_)));

    approve(&api, NodeKind::OpenQuestion, &question);
    let answer = api
        .create(&AnswerDraft::new(question, "Sometimes", "u2"))
        .await
        .unwrap();
    assert!(answer.discussion.is_some());

    let err = api
        .create(&AnswerDraft::new(NodeId::from_string("missing"), "No", "u2"))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::DependencyNotFound(_)));
}

// ============================================================================
// Peer review
// ============================================================================

async fn approved_evidence(api: &tally::ContentApi) -> NodeId {
    let parent = approved_statement(api, "Smoking causes cancer").await;
    let evidence = api
        .create(&EvidenceDraft::new(parent, "Cohort study", "https://example.org/study", "u1"))
        .await
        .unwrap()
        .node
        .id;
    approve(api, NodeKind::Evidence, &evidence);
    evidence
}

#[tokio::test]
async fn overall_score_weights_three_dimensions() {
    let api = api();
    let evidence = approved_evidence(&api).await;

    api.submit_peer_review(&evidence, "r1", ReviewScores::new(5, 4, 3), None)
        .unwrap();
    api.submit_peer_review(&evidence, "r2", ReviewScores::new(5, 4, 3), Some("solid".into()))
        .unwrap();

    let aggregate = api.review_aggregate(&evidence).unwrap().unwrap();
    assert_eq!(aggregate.review_count, 2);
    assert!(approx(aggregate.avg_quality, 5.0));
    assert!(approx(aggregate.avg_independence, 4.0));
    assert!(approx(aggregate.avg_relevance, 3.0));
    assert!((aggregate.overall_score - 4.0).abs() < 0.01);
    assert_eq!(api.reviews(&evidence).unwrap().len(), 2);
}

#[tokio::test]
async fn review_rules() {
    let api = api();
    let parent = approved_statement(&api, "Bees pollinate").await;
    let evidence = api
        .create(&EvidenceDraft::new(parent.clone(), "Field survey", "http://example.org/bees", "u1"))
        .await
        .unwrap()
        .node
        .id;

    let err = api
        .submit_peer_review(&evidence, "r1", ReviewScores::new(4, 4, 4), None)
        .unwrap_err();
    assert!(matches!(err, TallyError::ThresholdNotMet(_)));

    approve(&api, NodeKind::Evidence, &evidence);
    let err = api
        .submit_peer_review(&evidence, "r1", ReviewScores::new(6, 4, 4), None)
        .unwrap_err();
    assert!(matches!(err, TallyError::Validation(_)));

    api.submit_peer_review(&evidence, "r1", ReviewScores::new(4, 4, 4), None)
        .unwrap();
    let err = api
        .submit_peer_review(&evidence, "r1", ReviewScores::new(1, 1, 1), None)
        .unwrap_err();
    assert!(matches!(err, TallyError::DuplicateReview { .. }));

    let err = api
        .submit_peer_review(&parent, "r1", ReviewScores::new(4, 4, 4), None)
        .unwrap_err();
    assert!(matches!(err, TallyError::Capability { .. }));

    // Evidence is judged by review, not content votes
    let err = api
        .vote(NodeKind::Evidence, &evidence, "r2", VoteKind::Content, true)
        .unwrap_err();
    assert!(matches!(err, TallyError::Capability { .. }));
}

#[tokio::test]
async fn evidence_url_must_be_http() {
    let api = api();
    let parent = approved_statement(&api, "Tea contains caffeine").await;
    for url in ["ftp://example.org/x", "example.org", "https://exa mple.org"] {
        let err = api
            .create(&EvidenceDraft::new(parent.clone(), "Source", url, "u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, TallyError::Validation(_)), "{} accepted", url);
    }
}

// ============================================================================
// Collaborators
// ============================================================================

#[tokio::test]
async fn extraction_failure_is_a_warning() {
    let api = api().with_keyword_extractor(Arc::new(FailingExtractor));
    let created = api
        .create(&StatementDraft::new("Oceans are salty", "u1"))
        .await
        .unwrap();
    assert!(created.warnings.iter().any(|w| w.contains("keyword extraction failed")));
    assert!(api.get_node(&created.node.id).unwrap().is_some());
    assert!(created.discussion.is_some());
}

#[tokio::test]
async fn discussion_failure_is_a_warning() {
    let api = api().with_discussion_service(Arc::new(FailingDiscussions));
    let created = api
        .create(&StatementDraft::new("Oceans are salty", "u1"))
        .await
        .unwrap();
    assert!(created.discussion.is_none());
    assert!(created.warnings.iter().any(|w| w.contains("discussion not attached")));
    assert!(api.get_node(&created.node.id).unwrap().is_some());
}

#[tokio::test]
async fn extracted_words_start_contributing_once_approved() {
    let extractor = Arc::new(FixedExtractor::new(&[("Water", 0.5)]));
    let api = api().with_keyword_extractor(extractor.clone());

    let n = api
        .create(&StatementDraft::new("Water is wet", "u1"))
        .await
        .unwrap()
        .node
        .id;
    assert!(api.tags(&n).unwrap().is_empty());

    let words = api.list_nodes(Some(NodeKind::Word), 10).unwrap();
    assert_eq!(words.len(), 1);
    assert_eq!(words[0].text_property("word"), Some("water"));
    assert_eq!(words[0].inclusion.net, 0);
    approve(&api, NodeKind::Word, &words[0].id);

    let updated = api
        .update(
            &n,
            NodeUpdate {
                text: Some("Water is very wet".into()),
                ..NodeUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.node.text_property("text"), Some("Water is very wet"));
    assert!(updated.warnings.is_empty());
    assert_eq!(extractor.call_count(), 2);

    let tags = api.tags(&n).unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].word, "water");
    assert_eq!(tags[0].source, TagSource::Extracted);
    assert!(approx(tags[0].frequency, 0.5));
}

#[tokio::test]
async fn user_source_wins_over_extraction() {
    let extractor = Arc::new(FixedExtractor::new(&[("x", 0.5)]));
    let api = api().with_keyword_extractor(extractor);
    approved_word(&api, "x").await;

    let n = api
        .create(&StatementDraft::new("x marks the spot", "u1").with_keywords(vec![user_keyword("x", 1.0)]))
        .await
        .unwrap()
        .node
        .id;

    let tags = api.tags(&n).unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].source, TagSource::User);
    assert!(approx(tags[0].frequency, 1.5));
}

#[tokio::test]
async fn extracted_words_get_a_discussion() {
    let api = api().with_keyword_extractor(Arc::new(FixedExtractor::new(&[("novel", 1.0)])));
    api.create(&StatementDraft::new("A novel idea", "u1"))
        .await
        .unwrap();

    let words = api.list_nodes(Some(NodeKind::Word), 10).unwrap();
    assert_eq!(words.len(), 1);
    let discussion = api.discussion_for(&words[0].id).unwrap().unwrap();
    assert_eq!(discussion.node_kind, NodeKind::Word);
}

#[tokio::test]
async fn failed_create_registers_no_extracted_words() {
    let api = api().with_keyword_extractor(Arc::new(FixedExtractor::new(&[("stray", 1.0)])));

    let err = api
        .create(&StatementDraft::new("Stray thought", "u1").with_categories(vec![NodeId::from_string("missing")]))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::DependencyNotFound(_)));

    let err = api
        .create(&AnswerDraft::new(NodeId::from_string("missing"), "Stray answer", "u1"))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::DependencyNotFound(_)));

    assert!(api.list_nodes(Some(NodeKind::Word), 10).unwrap().is_empty());
    assert!(api.list_nodes(None, 10).unwrap().is_empty());
}

#[tokio::test]
async fn update_reports_extraction_failure() {
    let api = api().with_keyword_extractor(Arc::new(FailingExtractor));
    let n = api
        .create(&StatementDraft::new("Oceans are salty", "u1"))
        .await
        .unwrap()
        .node
        .id;

    let updated = api
        .update(
            &n,
            NodeUpdate {
                text: Some("Oceans are very salty".into()),
                ..NodeUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.node.text_property("text"), Some("Oceans are very salty"));
    assert!(updated.warnings.iter().any(|w| w.contains("keyword extraction failed")));
}
