//! Tally: dual-threshold voting and graph-consistency engine
//!
//! Typed content nodes (words, definitions, statements, open questions,
//! answers, evidence, categories, comments) gain visibility through community
//! voting. The engine decides when a node is included or visible, keeps
//! per-user votes and their aggregate counters consistent, and maintains the
//! derived relationships between nodes.
//!
//! # Core Concepts
//!
//! - **Inclusion votes**: admit a node into the visible corpus
//! - **Content votes**: judge a node's substance, only once it is included
//! - **Derived edges**: SHARED_TAG and SHARED_CATEGORY edges between nodes
//!   that share a keyword or a category, weighted by strength
//! - **Peer review**: the evidence-only substitute for content voting
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tally::{ContentApi, GraphStore, OpenStore, PolicyConfig, SqliteStore};
//!
//! let store: Arc<dyn GraphStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
//! let api = ContentApi::new(store, Arc::new(PolicyConfig::default()));
//! // API is ready for use
//! ```

pub mod api;
pub mod collab;
pub mod config;
pub mod discussion;
pub mod error;
mod graph;
pub mod ledger;
pub mod policy;
pub mod review;
pub mod storage;
pub mod synth;

pub use api::{CommentView, ContentApi, CreatedNode, NodeUpdate, UpdatedNode};
pub use collab::{
    CategoryService, CollaboratorError, DiscussionHandle, DiscussionService, KeywordExtractor, NoKeywords,
    StoreCatalog, WordService,
};
pub use config::{ConfigError, PolicyConfig};
pub use discussion::{AttachOutcome, DiscussionAttacher, StoreDiscussions};
pub use error::{TallyError, TallyResult};
pub use graph::{
    build_node, normalize_word, text_key, AggregateCounts, AnswerDraft, Categorizable, CategoryDraft, CommentDraft,
    CommentLink, ContentNode, ContentVotable, DefinitionDraft, Dependency, Discussable, Discussion, DiscussionId,
    EvidenceDraft, Keyword, NodeId, NodeKind, NodePair, NodeRecord, OpenQuestionDraft, PeerReview, Properties,
    PropertyValue, ReviewAggregate, ReviewScores, SharedCategory, SharedTag, Stance, StatementDraft, Structure,
    TagSource, Taggable, TaggedEdge, Votable, VoteCounts, VoteDirection, VoteKind, VoteRecord, VoteStatus,
    WordDraft, SCORE_RANGE,
};
pub use ledger::VoteLedger;
pub use policy::{capabilities, Capabilities, ThresholdPolicy};
pub use review::PeerReviewAggregator;
pub use storage::{GraphStore, OpenStore, SqliteStore, StorageError, StorageResult, StoreTx};
pub use synth::{CategorySyncReport, RelationshipSynthesizer, TagSyncReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
