//! The polymorphic contract every content kind implements.
//!
//! A draft describes a node that does not exist yet: who writes it, which
//! properties it carries, what must already exist for it to be created, and
//! which capability interfaces (tags, categories, discussion) it exposes.
//! Capability interfaces are reached through the `as_*` accessors so callers
//! can work with `&dyn NodeRecord` without matching on the concrete type.

use super::discussion::DiscussionId;
use super::edge::{normalize_word, Keyword};
use super::node::{ContentNode, NodeId, NodeKind, PropertyValue, Properties};
use crate::config::PolicyConfig;
use crate::error::{require_non_blank, TallyError, TallyResult};

/// Something that must already exist before a record can be written
#[derive(Debug, Clone, PartialEq)]
pub enum Dependency {
    /// A node of one of `kinds`; `approved` additionally requires it to have passed inclusion
    Node {
        id: NodeId,
        kinds: &'static [NodeKind],
        approved: bool,
        role: &'static str,
    },
    /// A Word node, looked up by its normalized text
    Word { word: String, approved: bool },
    /// A discussion, and optionally a comment inside that same discussion
    Discussion {
        id: DiscussionId,
        parent_comment: Option<NodeId>,
    },
}

/// Index entries written alongside the node row
#[derive(Debug, Clone, PartialEq)]
pub enum Structure {
    Standalone,
    /// Unique word → node index entry
    Word(String),
    /// COMPOSED_OF edges to these words
    Category(Vec<String>),
    /// Placement of a comment in its thread
    Comment {
        discussion_id: DiscussionId,
        parent_comment_id: Option<NodeId>,
    },
}

pub trait NodeRecord: Send + Sync {
    fn kind(&self) -> NodeKind;

    fn author(&self) -> &str;

    fn public_credit(&self) -> bool {
        false
    }

    /// Kind-specific field checks; dependency existence is checked by the caller
    fn validate(&self, config: &PolicyConfig) -> TallyResult<()>;

    fn properties(&self) -> Properties;

    fn dependencies(&self) -> Vec<Dependency> {
        Vec::new()
    }

    fn structure(&self) -> Structure {
        Structure::Standalone
    }

    fn as_taggable(&self) -> Option<&dyn Taggable> {
        None
    }

    fn as_categorizable(&self) -> Option<&dyn Categorizable> {
        None
    }

    fn as_discussable(&self) -> Option<&dyn Discussable> {
        None
    }
}

/// Kinds that carry a keyword set
pub trait Taggable: NodeRecord {
    /// Author-supplied keywords
    fn keywords(&self) -> &[Keyword];

    /// Text handed to keyword extraction
    fn extraction_text(&self) -> &str;
}

/// Kinds that may belong to up to `max_categories` categories
pub trait Categorizable: NodeRecord {
    fn category_ids(&self) -> &[NodeId];
}

/// Kinds that get a discussion container on creation
pub trait Discussable: NodeRecord {
    fn initial_comment(&self) -> Option<&str>;
}

/// Kinds that take inclusion votes.
///
/// Informational only: votes are gated by [`crate::policy::capabilities`],
/// which this marker mirrors for typed code that wants a compile-time bound.
pub trait Votable: NodeRecord {}

/// Kinds that take content votes. Informational only, like [`Votable`].
pub trait ContentVotable: NodeRecord {}

/// Materialize a record as a fresh node with zeroed counters
pub fn build_node(record: &dyn NodeRecord) -> ContentNode {
    let mut node = ContentNode::new(record.kind(), record.author()).with_public_credit(record.public_credit());
    node.properties = record.properties();
    node
}

/// Property holding the editable text of a kind, if it has one
pub fn text_key(kind: NodeKind) -> Option<&'static str> {
    match kind {
        NodeKind::Definition
        | NodeKind::Statement
        | NodeKind::OpenQuestion
        | NodeKind::Answer
        | NodeKind::Comment => Some("text"),
        NodeKind::Evidence => Some("title"),
        // Word and category identity is their text
        NodeKind::Word | NodeKind::Category => None,
    }
}

fn validate_tagging(keywords: &[Keyword], categories: &[NodeId], config: &PolicyConfig) -> TallyResult<()> {
    for keyword in keywords {
        require_non_blank("keyword", &keyword.word)?;
    }
    let mut distinct: Vec<&NodeId> = categories.iter().collect();
    distinct.sort();
    distinct.dedup();
    if distinct.len() > config.max_categories {
        return Err(TallyError::validation(format!(
            "at most {} categories allowed, got {}",
            config.max_categories,
            distinct.len()
        )));
    }
    if distinct.iter().any(|id| id.is_blank()) {
        return Err(TallyError::validation("category id must not be empty"));
    }
    Ok(())
}

fn non_blank(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|t| !t.trim().is_empty())
}

// === Word ===

#[derive(Debug, Clone, PartialEq)]
pub struct WordDraft {
    pub word: String,
    pub created_by: String,
    pub public_credit: bool,
    pub initial_comment: Option<String>,
}

impl WordDraft {
    pub fn new(word: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            created_by: created_by.into(),
            public_credit: false,
            initial_comment: None,
        }
    }
}

impl NodeRecord for WordDraft {
    fn kind(&self) -> NodeKind {
        NodeKind::Word
    }

    fn author(&self) -> &str {
        &self.created_by
    }

    fn public_credit(&self) -> bool {
        self.public_credit
    }

    fn validate(&self, _config: &PolicyConfig) -> TallyResult<()> {
        require_non_blank("created_by", &self.created_by)?;
        require_non_blank("word", &self.word)
    }

    fn properties(&self) -> Properties {
        Properties::from([("word".to_string(), normalize_word(&self.word).into())])
    }

    fn structure(&self) -> Structure {
        Structure::Word(normalize_word(&self.word))
    }

    fn as_discussable(&self) -> Option<&dyn Discussable> {
        Some(self)
    }
}

impl Discussable for WordDraft {
    fn initial_comment(&self) -> Option<&str> {
        non_blank(&self.initial_comment)
    }
}

impl Votable for WordDraft {}

// === Definition ===

#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionDraft {
    pub word: String,
    pub text: String,
    pub created_by: String,
    pub public_credit: bool,
    pub initial_comment: Option<String>,
}

impl DefinitionDraft {
    pub fn new(word: impl Into<String>, text: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            text: text.into(),
            created_by: created_by.into(),
            public_credit: false,
            initial_comment: None,
        }
    }
}

impl NodeRecord for DefinitionDraft {
    fn kind(&self) -> NodeKind {
        NodeKind::Definition
    }

    fn author(&self) -> &str {
        &self.created_by
    }

    fn public_credit(&self) -> bool {
        self.public_credit
    }

    fn validate(&self, _config: &PolicyConfig) -> TallyResult<()> {
        require_non_blank("created_by", &self.created_by)?;
        require_non_blank("word", &self.word)?;
        require_non_blank("text", &self.text)
    }

    fn properties(&self) -> Properties {
        Properties::from([
            ("word".to_string(), normalize_word(&self.word).into()),
            ("text".to_string(), self.text.trim().into()),
        ])
    }

    /// A fresh word takes its first definitions before anyone has voted on it
    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Word {
            word: normalize_word(&self.word),
            approved: false,
        }]
    }

    fn as_discussable(&self) -> Option<&dyn Discussable> {
        Some(self)
    }
}

impl Discussable for DefinitionDraft {
    fn initial_comment(&self) -> Option<&str> {
        non_blank(&self.initial_comment)
    }
}

impl Votable for DefinitionDraft {}
impl ContentVotable for DefinitionDraft {}

// === Statement ===

#[derive(Debug, Clone, PartialEq)]
pub struct StatementDraft {
    pub text: String,
    pub created_by: String,
    pub public_credit: bool,
    pub keywords: Vec<Keyword>,
    pub categories: Vec<NodeId>,
    /// Statement this one responds to
    pub parent_statement: Option<NodeId>,
    pub initial_comment: Option<String>,
}

impl StatementDraft {
    pub fn new(text: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            created_by: created_by.into(),
            public_credit: false,
            keywords: Vec::new(),
            categories: Vec::new(),
            parent_statement: None,
            initial_comment: None,
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<Keyword>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_categories(mut self, categories: Vec<NodeId>) -> Self {
        self.categories = categories;
        self
    }
}

impl NodeRecord for StatementDraft {
    fn kind(&self) -> NodeKind {
        NodeKind::Statement
    }

    fn author(&self) -> &str {
        &self.created_by
    }

    fn public_credit(&self) -> bool {
        self.public_credit
    }

    fn validate(&self, config: &PolicyConfig) -> TallyResult<()> {
        require_non_blank("created_by", &self.created_by)?;
        require_non_blank("text", &self.text)?;
        validate_tagging(&self.keywords, &self.categories, config)
    }

    fn properties(&self) -> Properties {
        let mut props = Properties::from([("text".to_string(), self.text.trim().into())]);
        if let Some(parent) = &self.parent_statement {
            props.insert("parent_statement_id".to_string(), parent.as_str().into());
        }
        props
    }

    fn dependencies(&self) -> Vec<Dependency> {
        self.parent_statement
            .iter()
            .map(|id| Dependency::Node {
                id: id.clone(),
                kinds: &[NodeKind::Statement],
                approved: false,
                role: "parent statement",
            })
            .collect()
    }

    fn as_taggable(&self) -> Option<&dyn Taggable> {
        Some(self)
    }

    fn as_categorizable(&self) -> Option<&dyn Categorizable> {
        Some(self)
    }

    fn as_discussable(&self) -> Option<&dyn Discussable> {
        Some(self)
    }
}

impl Taggable for StatementDraft {
    fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    fn extraction_text(&self) -> &str {
        &self.text
    }
}

impl Categorizable for StatementDraft {
    fn category_ids(&self) -> &[NodeId] {
        &self.categories
    }
}

impl Discussable for StatementDraft {
    fn initial_comment(&self) -> Option<&str> {
        non_blank(&self.initial_comment)
    }
}

impl Votable for StatementDraft {}
impl ContentVotable for StatementDraft {}

// === OpenQuestion ===

#[derive(Debug, Clone, PartialEq)]
pub struct OpenQuestionDraft {
    pub text: String,
    pub created_by: String,
    pub public_credit: bool,
    pub keywords: Vec<Keyword>,
    pub categories: Vec<NodeId>,
    pub initial_comment: Option<String>,
}

impl OpenQuestionDraft {
    pub fn new(text: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            created_by: created_by.into(),
            public_credit: false,
            keywords: Vec::new(),
            categories: Vec::new(),
            initial_comment: None,
        }
    }
}

impl NodeRecord for OpenQuestionDraft {
    fn kind(&self) -> NodeKind {
        NodeKind::OpenQuestion
    }

    fn author(&self) -> &str {
        &self.created_by
    }

    fn public_credit(&self) -> bool {
        self.public_credit
    }

    fn validate(&self, config: &PolicyConfig) -> TallyResult<()> {
        require_non_blank("created_by", &self.created_by)?;
        require_non_blank("text", &self.text)?;
        validate_tagging(&self.keywords, &self.categories, config)
    }

    fn properties(&self) -> Properties {
        Properties::from([("text".to_string(), self.text.trim().into())])
    }

    fn as_taggable(&self) -> Option<&dyn Taggable> {
        Some(self)
    }

    fn as_categorizable(&self) -> Option<&dyn Categorizable> {
        Some(self)
    }

    fn as_discussable(&self) -> Option<&dyn Discussable> {
        Some(self)
    }
}

impl Taggable for OpenQuestionDraft {
    fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    fn extraction_text(&self) -> &str {
        &self.text
    }
}

impl Categorizable for OpenQuestionDraft {
    fn category_ids(&self) -> &[NodeId] {
        &self.categories
    }
}

impl Discussable for OpenQuestionDraft {
    fn initial_comment(&self) -> Option<&str> {
        non_blank(&self.initial_comment)
    }
}

impl Votable for OpenQuestionDraft {}

// === Answer ===

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerDraft {
    pub question_id: NodeId,
    pub text: String,
    pub created_by: String,
    pub public_credit: bool,
    pub keywords: Vec<Keyword>,
    pub categories: Vec<NodeId>,
    pub initial_comment: Option<String>,
}

impl AnswerDraft {
    pub fn new(question_id: NodeId, text: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            question_id,
            text: text.into(),
            created_by: created_by.into(),
            public_credit: false,
            keywords: Vec::new(),
            categories: Vec::new(),
            initial_comment: None,
        }
    }
}

impl NodeRecord for AnswerDraft {
    fn kind(&self) -> NodeKind {
        NodeKind::Answer
    }

    fn author(&self) -> &str {
        &self.created_by
    }

    fn public_credit(&self) -> bool {
        self.public_credit
    }

    fn validate(&self, config: &PolicyConfig) -> TallyResult<()> {
        require_non_blank("created_by", &self.created_by)?;
        require_non_blank("question_id", self.question_id.as_str())?;
        require_non_blank("text", &self.text)?;
        validate_tagging(&self.keywords, &self.categories, config)
    }

    fn properties(&self) -> Properties {
        Properties::from([
            ("text".to_string(), self.text.trim().into()),
            ("question_id".to_string(), self.question_id.as_str().into()),
        ])
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Node {
            id: self.question_id.clone(),
            kinds: &[NodeKind::OpenQuestion],
            approved: true,
            role: "question",
        }]
    }

    fn as_taggable(&self) -> Option<&dyn Taggable> {
        Some(self)
    }

    fn as_categorizable(&self) -> Option<&dyn Categorizable> {
        Some(self)
    }

    fn as_discussable(&self) -> Option<&dyn Discussable> {
        Some(self)
    }
}

impl Taggable for AnswerDraft {
    fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    fn extraction_text(&self) -> &str {
        &self.text
    }
}

impl Categorizable for AnswerDraft {
    fn category_ids(&self) -> &[NodeId] {
        &self.categories
    }
}

impl Discussable for AnswerDraft {
    fn initial_comment(&self) -> Option<&str> {
        non_blank(&self.initial_comment)
    }
}

impl Votable for AnswerDraft {}
impl ContentVotable for AnswerDraft {}

// === Evidence ===

#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceDraft {
    pub parent_id: NodeId,
    pub title: String,
    pub url: String,
    pub created_by: String,
    pub public_credit: bool,
    pub keywords: Vec<Keyword>,
    pub categories: Vec<NodeId>,
    pub initial_comment: Option<String>,
}

impl EvidenceDraft {
    pub fn new(
        parent_id: NodeId,
        title: impl Into<String>,
        url: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            parent_id,
            title: title.into(),
            url: url.into(),
            created_by: created_by.into(),
            public_credit: false,
            keywords: Vec::new(),
            categories: Vec::new(),
            initial_comment: None,
        }
    }
}

fn validate_url(url: &str) -> TallyResult<()> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| TallyError::validation(format!("evidence url must be http(s): '{}'", url)))?;
    if rest.is_empty() || rest.contains(char::is_whitespace) {
        return Err(TallyError::validation(format!("evidence url is malformed: '{}'", url)));
    }
    Ok(())
}

impl NodeRecord for EvidenceDraft {
    fn kind(&self) -> NodeKind {
        NodeKind::Evidence
    }

    fn author(&self) -> &str {
        &self.created_by
    }

    fn public_credit(&self) -> bool {
        self.public_credit
    }

    fn validate(&self, config: &PolicyConfig) -> TallyResult<()> {
        require_non_blank("created_by", &self.created_by)?;
        require_non_blank("parent_id", self.parent_id.as_str())?;
        require_non_blank("title", &self.title)?;
        validate_url(&self.url)?;
        validate_tagging(&self.keywords, &self.categories, config)
    }

    fn properties(&self) -> Properties {
        Properties::from([
            ("title".to_string(), self.title.trim().into()),
            ("url".to_string(), self.url.trim().into()),
            ("parent_id".to_string(), self.parent_id.as_str().into()),
        ])
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Node {
            id: self.parent_id.clone(),
            kinds: &[NodeKind::Statement, NodeKind::Answer, NodeKind::OpenQuestion],
            approved: true,
            role: "evidence parent",
        }]
    }

    fn as_taggable(&self) -> Option<&dyn Taggable> {
        Some(self)
    }

    fn as_categorizable(&self) -> Option<&dyn Categorizable> {
        Some(self)
    }

    fn as_discussable(&self) -> Option<&dyn Discussable> {
        Some(self)
    }
}

impl Taggable for EvidenceDraft {
    fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    fn extraction_text(&self) -> &str {
        &self.title
    }
}

impl Categorizable for EvidenceDraft {
    fn category_ids(&self) -> &[NodeId] {
        &self.categories
    }
}

impl Discussable for EvidenceDraft {
    fn initial_comment(&self) -> Option<&str> {
        non_blank(&self.initial_comment)
    }
}

impl Votable for EvidenceDraft {}

// === Category ===

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDraft {
    pub words: Vec<String>,
    pub created_by: String,
    pub public_credit: bool,
    pub initial_comment: Option<String>,
}

impl CategoryDraft {
    pub fn new(words: Vec<String>, created_by: impl Into<String>) -> Self {
        Self {
            words,
            created_by: created_by.into(),
            public_credit: false,
            initial_comment: None,
        }
    }

    /// Normalized words in the order given, duplicates removed
    fn normalized_words(&self) -> Vec<String> {
        let mut words: Vec<String> = Vec::new();
        for word in self.words.iter().map(|w| normalize_word(w)) {
            if !words.contains(&word) {
                words.push(word);
            }
        }
        words
    }
}

impl NodeRecord for CategoryDraft {
    fn kind(&self) -> NodeKind {
        NodeKind::Category
    }

    fn author(&self) -> &str {
        &self.created_by
    }

    fn public_credit(&self) -> bool {
        self.public_credit
    }

    fn validate(&self, config: &PolicyConfig) -> TallyResult<()> {
        require_non_blank("created_by", &self.created_by)?;
        for word in &self.words {
            require_non_blank("category word", word)?;
        }
        let count = self.normalized_words().len();
        let range = &config.category_words;
        if count < range.min || count > range.max {
            return Err(TallyError::validation(format!(
                "a category is composed of {} to {} words, got {}",
                range.min, range.max, count
            )));
        }
        Ok(())
    }

    fn properties(&self) -> Properties {
        let words = self.normalized_words();
        Properties::from([
            ("name".to_string(), words.join(" ").into()),
            (
                "words".to_string(),
                PropertyValue::Array(words.into_iter().map(PropertyValue::from).collect()),
            ),
        ])
    }

    fn dependencies(&self) -> Vec<Dependency> {
        self.normalized_words()
            .into_iter()
            .map(|word| Dependency::Word { word, approved: true })
            .collect()
    }

    fn structure(&self) -> Structure {
        Structure::Category(self.normalized_words())
    }

    fn as_discussable(&self) -> Option<&dyn Discussable> {
        Some(self)
    }
}

impl Discussable for CategoryDraft {
    fn initial_comment(&self) -> Option<&str> {
        non_blank(&self.initial_comment)
    }
}

impl Votable for CategoryDraft {}

// === Comment ===

#[derive(Debug, Clone, PartialEq)]
pub struct CommentDraft {
    pub discussion_id: DiscussionId,
    pub parent_comment_id: Option<NodeId>,
    pub text: String,
    pub created_by: String,
}

impl CommentDraft {
    pub fn new(discussion_id: DiscussionId, text: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            discussion_id,
            parent_comment_id: None,
            text: text.into(),
            created_by: created_by.into(),
        }
    }

    pub fn reply_to(mut self, parent: NodeId) -> Self {
        self.parent_comment_id = Some(parent);
        self
    }
}

impl NodeRecord for CommentDraft {
    fn kind(&self) -> NodeKind {
        NodeKind::Comment
    }

    fn author(&self) -> &str {
        &self.created_by
    }

    fn validate(&self, _config: &PolicyConfig) -> TallyResult<()> {
        require_non_blank("created_by", &self.created_by)?;
        require_non_blank("discussion_id", self.discussion_id.as_str())?;
        require_non_blank("text", &self.text)
    }

    fn properties(&self) -> Properties {
        let mut props = Properties::from([
            ("text".to_string(), self.text.trim().into()),
            ("discussion_id".to_string(), self.discussion_id.as_str().into()),
        ]);
        if let Some(parent) = &self.parent_comment_id {
            props.insert("parent_comment_id".to_string(), parent.as_str().into());
        }
        props
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Discussion {
            id: self.discussion_id.clone(),
            parent_comment: self.parent_comment_id.clone(),
        }]
    }

    fn structure(&self) -> Structure {
        Structure::Comment {
            discussion_id: self.discussion_id.clone(),
            parent_comment_id: self.parent_comment_id.clone(),
        }
    }
}

impl ContentVotable for CommentDraft {}
