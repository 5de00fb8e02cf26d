//! DiscussionAttacher: one discussion container per content node.
//!
//! Attachment happens after the node's own transaction has committed and is
//! best-effort. A failure is logged and reported back as an outcome, never as
//! an error that would undo the node.

use crate::collab::{CollaboratorError, DiscussionHandle, DiscussionService};
use crate::graph::{build_node, CommentDraft, CommentLink, Discussion, DiscussionId, NodeId, NodeKind};
use crate::storage::{in_transaction, GraphStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of an attach attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    Created(DiscussionId),
    /// The node already had this discussion
    Existing(DiscussionId),
    Failed(String),
}

impl AttachOutcome {
    pub fn discussion_id(&self) -> Option<&DiscussionId> {
        match self {
            AttachOutcome::Created(id) | AttachOutcome::Existing(id) => Some(id),
            AttachOutcome::Failed(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct DiscussionAttacher {
    service: Arc<dyn DiscussionService>,
}

impl DiscussionAttacher {
    pub fn new(service: Arc<dyn DiscussionService>) -> Self {
        Self { service }
    }

    pub async fn attach(
        &self,
        node_id: &NodeId,
        node_kind: NodeKind,
        created_by: &str,
        initial_comment: Option<&str>,
    ) -> AttachOutcome {
        let initial_comment = initial_comment.filter(|c| !c.trim().is_empty());
        match self
            .service
            .create_discussion(node_id, node_kind, created_by, initial_comment)
            .await
        {
            Ok(DiscussionHandle { id, created: true }) => {
                debug!(node = %node_id, discussion = %id, "discussion attached");
                AttachOutcome::Created(id)
            }
            Ok(DiscussionHandle { id, created: false }) => AttachOutcome::Existing(id),
            Err(e) => {
                warn!(node = %node_id, "discussion attachment failed: {}", e);
                AttachOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Discussions stored next to the content graph
#[derive(Clone)]
pub struct StoreDiscussions {
    store: Arc<dyn GraphStore>,
}

impl StoreDiscussions {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    fn attach_now(
        &self,
        node_id: &NodeId,
        node_kind: NodeKind,
        created_by: &str,
        initial_comment: Option<&str>,
    ) -> Result<DiscussionHandle, CollaboratorError> {
        in_transaction(self.store.as_ref(), |tx| {
            if let Some(existing) = tx.discussion_for(node_id)? {
                return Ok(DiscussionHandle {
                    id: existing.id,
                    created: false,
                });
            }

            let discussion = Discussion::new(node_id.clone(), node_kind, created_by);
            tx.insert_discussion(&discussion)?;

            if let Some(text) = initial_comment {
                let comment = build_node(&CommentDraft::new(discussion.id.clone(), text.trim(), created_by));
                tx.insert_node(&comment)?;
                tx.link_comment(&CommentLink {
                    comment_id: comment.id,
                    discussion_id: discussion.id.clone(),
                    parent_comment_id: None,
                })?;
            }

            Ok(DiscussionHandle {
                id: discussion.id,
                created: true,
            })
        })
    }
}

#[async_trait]
impl DiscussionService for StoreDiscussions {
    async fn create_discussion(
        &self,
        node_id: &NodeId,
        node_kind: NodeKind,
        created_by: &str,
        initial_comment: Option<&str>,
    ) -> Result<DiscussionHandle, CollaboratorError> {
        self.attach_now(node_id, node_kind, created_by, initial_comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{read_only, OpenStore, SqliteStore};

    struct Unreachable;

    #[async_trait]
    impl DiscussionService for Unreachable {
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

    fn store() -> Arc<dyn GraphStore> {
        Arc::new(SqliteStore::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn attach_is_idempotent() {
        let store = store();
        let attacher = DiscussionAttacher::new(Arc::new(StoreDiscussions::new(store.clone())));
        let node = NodeId::from_string("s1");

        let first = attacher.attach(&node, NodeKind::Statement, "u1", None).await;
        let second = attacher.attach(&node, NodeKind::Statement, "u1", Some("late")).await;

        let AttachOutcome::Created(id) = first else {
            panic!("expected a new discussion, got {:?}", first);
        };
        assert_eq!(second, AttachOutcome::Existing(id.clone()));

        let comments = read_only(store.as_ref(), |tx| tx.comments_in(&id)).unwrap();
        assert!(comments.is_empty());
    }

    #[tokio::test]
    async fn initial_comment_seeds_thread() {
        let store = store();
        let attacher = DiscussionAttacher::new(Arc::new(StoreDiscussions::new(store.clone())));
        let node = NodeId::from_string("s1");

        let outcome = attacher
            .attach(&node, NodeKind::Statement, "u1", Some("First!"))
            .await;
        let id = outcome.discussion_id().unwrap().clone();

        let comments = read_only(store.as_ref(), |tx| tx.comments_in(&id)).unwrap();
        assert_eq!(comments.len(), 1);
        let comment = read_only(store.as_ref(), |tx| tx.load_node(&comments[0].comment_id))
            .unwrap()
            .unwrap();
        assert_eq!(comment.kind, NodeKind::Comment);
        assert_eq!(comment.text_property("text"), Some("First!"));
    }

    #[tokio::test]
    async fn blank_initial_comment_is_ignored() {
        let store = store();
        let attacher = DiscussionAttacher::new(Arc::new(StoreDiscussions::new(store.clone())));
        let outcome = attacher
            .attach(&NodeId::from_string("s1"), NodeKind::Statement, "u1", Some("   "))
            .await;
        let id = outcome.discussion_id().unwrap().clone();
        let comments = read_only(store.as_ref(), |tx| tx.comments_in(&id)).unwrap();
        assert!(comments.is_empty());
    }

    #[tokio::test]
    async fn service_failure_becomes_outcome() {
        let attacher = DiscussionAttacher::new(Arc::new(Unreachable));
        let outcome = attacher
            .attach(&NodeId::from_string("s1"), NodeKind::Statement, "u1", None)
            .await;
        assert!(matches!(outcome, AttachOutcome::Failed(reason) if reason.contains("connection refused")));
    }
}
