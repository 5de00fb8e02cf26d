//! Core graph data structures

mod discussion;
mod edge;
mod node;
mod record;
mod review;
mod vote;

pub use discussion::{CommentLink, Discussion, DiscussionId};
pub use edge::{normalize_word, Keyword, NodePair, SharedCategory, SharedTag, TagSource, TaggedEdge};
pub use node::{
    AggregateCounts, ContentNode, NodeId, NodeKind, Properties, PropertyValue, VoteCounts, VoteDirection,
    VoteKind,
};
pub use record::{
    build_node, text_key, AnswerDraft, Categorizable, CategoryDraft, CommentDraft, ContentVotable,
    DefinitionDraft, Dependency, Discussable, EvidenceDraft, NodeRecord, OpenQuestionDraft, StatementDraft,
    Structure, Taggable, Votable, WordDraft,
};
pub use review::{PeerReview, ReviewAggregate, ReviewScores, SCORE_RANGE};
pub use vote::{Stance, VoteRecord, VoteStatus};
