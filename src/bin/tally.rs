//! Tally CLI: create content, vote on it and inspect the derived graph.
//!
//! Usage:
//!   tally [--db path] [--config path] word <word> --user <id>
//!   tally [--db path] vote statement <node-id> --user <id> [--down] [--content]
//!   tally [--db path] show <node-id> [--user <id>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tally::{
    AnswerDraft, CategoryDraft, CommentDraft, ContentApi, ContentNode, CreatedNode, DefinitionDraft, DiscussionId,
    EvidenceDraft, GraphStore, Keyword, NodeId, NodeKind, NodeRecord, OpenQuestionDraft, PolicyConfig, ReviewScores,
    SqliteStore, StatementDraft, TallyError, VoteKind, WordDraft,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Dual-threshold voting and graph-consistency engine"
)]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to a YAML policy file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a word
    Word {
        word: String,
        #[arg(long)]
        user: String,
        /// Initial definition of the word
        #[arg(long)]
        definition: Option<String>,
    },
    /// Create a statement
    Statement {
        text: String,
        #[arg(long)]
        user: String,
        /// Keyword (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Category id (repeatable, at most 3)
        #[arg(long = "category")]
        categories: Vec<String>,
        /// Statement this one responds to
        #[arg(long)]
        parent: Option<String>,
    },
    /// Create an open question
    Question {
        text: String,
        #[arg(long)]
        user: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// Answer an open question
    Answer {
        question: String,
        text: String,
        #[arg(long)]
        user: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// Attach evidence to a statement, answer or question
    Evidence {
        parent: String,
        title: String,
        url: String,
        #[arg(long)]
        user: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// Create a category from 1 to 5 approved words
    Category {
        #[arg(required = true)]
        words: Vec<String>,
        #[arg(long)]
        user: String,
    },
    /// Comment in a node's discussion
    Comment {
        node: String,
        text: String,
        #[arg(long)]
        user: String,
        /// Comment being replied to
        #[arg(long)]
        reply_to: Option<String>,
    },
    /// Vote on a node
    Vote {
        #[arg(value_parser = parse_kind)]
        kind: NodeKind,
        node: String,
        #[arg(long)]
        user: String,
        /// Vote against instead of for
        #[arg(long)]
        down: bool,
        /// Vote on content instead of inclusion
        #[arg(long)]
        content: bool,
    },
    /// Withdraw a vote
    Unvote {
        #[arg(value_parser = parse_kind)]
        kind: NodeKind,
        node: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        content: bool,
    },
    /// Show a user's votes on a node
    Status {
        #[arg(value_parser = parse_kind)]
        kind: NodeKind,
        node: String,
        #[arg(long)]
        user: String,
    },
    /// Show a node with its relationships
    Show {
        node: String,
        /// Evaluate visibility for this user
        #[arg(long)]
        user: Option<String>,
    },
    /// List nodes
    List {
        #[arg(long, value_parser = parse_kind)]
        kind: Option<NodeKind>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Peer-review evidence (scores 1-5)
    Review {
        evidence: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        quality: u8,
        #[arg(long)]
        independence: u8,
        #[arg(long)]
        relevance: u8,
        #[arg(long)]
        comments: Option<String>,
    },
    /// Replace a node's keywords
    Tags {
        node: String,
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Delete a node and its discussion
    Delete { node: String },
}

fn parse_kind(raw: &str) -> Result<NodeKind, String> {
    match raw {
        "question" => Ok(NodeKind::OpenQuestion),
        other => NodeKind::parse(other).ok_or_else(|| {
            let known: Vec<&str> = NodeKind::ALL.iter().map(|k| k.as_str()).collect();
            format!("unknown kind '{}', expected one of: {}", other, known.join(", "))
        }),
    }
}

/// Get the default database path (~/.local/share/tally/tally.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir().unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("tally").join("tally.db")
}

fn open_api(db: Option<PathBuf>, config: Option<PathBuf>) -> Result<ContentApi, String> {
    let config = match config {
        Some(path) => PolicyConfig::from_path(&path)
            .map_err(|e| format!("Failed to load config '{}': {}", path.display(), e))?,
        None => PolicyConfig::default(),
    };
    let db_path = db.unwrap_or_else(default_db_path);
    let store = SqliteStore::open_with(&db_path, &config.storage)
        .map_err(|e| format!("Failed to open database: {}", e))?;
    let store: Arc<dyn GraphStore> = Arc::new(store);
    Ok(ContentApi::new(store, Arc::new(config)))
}

fn fail(e: TallyError) -> i32 {
    eprintln!("Error: {}", e);
    if e.is_retryable() {
        eprintln!("(the database was busy; the command can be retried)");
    }
    1
}

fn keywords(tags: Vec<String>) -> Vec<Keyword> {
    tags.into_iter().map(Keyword::user).collect()
}

fn ids(raw: Vec<String>) -> Vec<NodeId> {
    raw.into_iter().map(NodeId::from_string).collect()
}

fn print_node(node: &ContentNode) {
    println!("{}  {}", node.kind, node.id);
    let mut keys: Vec<&String> = node.properties.keys().collect();
    keys.sort();
    for key in keys {
        if let Some(value) = node.properties.get(key) {
            match value.as_str() {
                Some(text) => println!("  {:<18} {}", key, text),
                None => println!("  {:<18} {:?}", key, value),
            }
        }
    }
    println!(
        "  {:<18} +{} / -{} (net {})",
        "inclusion", node.inclusion.positive, node.inclusion.negative, node.inclusion.net
    );
    println!(
        "  {:<18} +{} / -{} (net {})",
        "content", node.content.positive, node.content.negative, node.content.net
    );
}

async fn cmd_create(api: &ContentApi, record: &dyn NodeRecord) -> i32 {
    match api.create(record).await {
        Ok(CreatedNode {
            node,
            discussion,
            warnings,
        }) => {
            println!("Created {} {}", node.kind, node.id);
            if let Some(discussion) = discussion {
                println!("  discussion {}", discussion);
            }
            for warning in warnings {
                eprintln!("Warning: {}", warning);
            }
            0
        }
        Err(e) => fail(e),
    }
}

async fn cmd_word(api: &ContentApi, word: &str, user: &str, definition: Option<String>) -> i32 {
    let code = cmd_create(api, &WordDraft::new(word, user)).await;
    match definition {
        Some(text) if code == 0 => cmd_create(api, &DefinitionDraft::new(word, text, user)).await,
        _ => code,
    }
}

async fn cmd_comment(api: &ContentApi, node: &str, text: &str, user: &str, reply_to: Option<String>) -> i32 {
    let discussion: DiscussionId = match api.discussion_for(&NodeId::from_string(node)) {
        Ok(Some(discussion)) => discussion.id,
        Ok(None) => {
            eprintln!("Error: node {} has no discussion", node);
            return 1;
        }
        Err(e) => return fail(e),
    };
    let mut draft = CommentDraft::new(discussion, text, user);
    if let Some(parent) = reply_to {
        draft = draft.reply_to(NodeId::from_string(parent));
    }
    cmd_create(api, &draft).await
}

fn vote_kind(content: bool) -> VoteKind {
    if content {
        VoteKind::Content
    } else {
        VoteKind::Inclusion
    }
}

fn cmd_vote(api: &ContentApi, kind: NodeKind, node: &str, user: &str, up: bool, content: bool) -> i32 {
    let vote_kind = vote_kind(content);
    match api.vote(kind, &NodeId::from_string(node), user, vote_kind, up) {
        Ok(counts) => {
            let c = counts.get(vote_kind);
            println!("{} votes: +{} / -{} (net {})", vote_kind, c.positive, c.negative, c.net);
            0
        }
        Err(e) => fail(e),
    }
}

fn cmd_unvote(api: &ContentApi, kind: NodeKind, node: &str, user: &str, content: bool) -> i32 {
    let vote_kind = vote_kind(content);
    match api.remove_vote(kind, &NodeId::from_string(node), user, vote_kind) {
        Ok(counts) => {
            println!("{} net is now {}", vote_kind, counts.get(vote_kind).net);
            0
        }
        Err(e) => fail(e),
    }
}

fn cmd_status(api: &ContentApi, kind: NodeKind, node: &str, user: &str) -> i32 {
    match api.get_vote_status(kind, &NodeId::from_string(node), user) {
        Ok(Some(status)) => {
            println!("inclusion: {:?} (net {})", status.inclusion_status, status.counts.inclusion.net);
            println!("content:   {:?} (net {})", status.content_status, status.counts.content.net);
            0
        }
        Ok(None) => {
            eprintln!("Error: no {} with id {}", kind, node);
            1
        }
        Err(e) => fail(e),
    }
}

fn cmd_show(api: &ContentApi, node: &str, user: Option<&str>) -> i32 {
    let id = NodeId::from_string(node);
    let found = match api.get_node(&id) {
        Ok(Some(found)) => found,
        Ok(None) => {
            eprintln!("Error: node {} not found", node);
            return 1;
        }
        Err(e) => return fail(e),
    };
    print_node(&found);

    let report = || -> Result<(), TallyError> {
        println!("  {:<18} {}", "visible", api.is_visible(&id, user)?);
        for tag in api.tags(&id)? {
            println!("  tag                {} ({}, {})", tag.word, tag.frequency, tag.source.as_str());
        }
        for category in api.categories(&id)? {
            println!("  category           {}", category);
        }
        for shared in api.shared_tags(&id)? {
            if let Some(other) = shared.pair.other(&id) {
                println!("  shares '{}' with {} (strength {})", shared.word, other, shared.strength);
            }
        }
        for shared in api.shared_categories(&id)? {
            if let Some(other) = shared.pair.other(&id) {
                println!(
                    "  shares category {} with {} (strength {})",
                    shared.category_id, other, shared.strength
                );
            }
        }
        if let Some(aggregate) = api.review_aggregate(&id)? {
            println!(
                "  reviews            {} (overall {:.3})",
                aggregate.review_count, aggregate.overall_score
            );
        }
        for comment in api.comments(&id)? {
            if comment.visible {
                println!(
                    "  comment {} by {}: {}",
                    comment.node.id,
                    comment.node.created_by,
                    comment.node.text_property("text").unwrap_or_default()
                );
            }
        }
        Ok(())
    };
    match report() {
        Ok(()) => 0,
        Err(e) => fail(e),
    }
}

fn cmd_list(api: &ContentApi, kind: Option<NodeKind>, limit: usize) -> i32 {
    match api.list_nodes(kind, limit) {
        Ok(nodes) if nodes.is_empty() => {
            println!("No nodes.");
            0
        }
        Ok(nodes) => {
            println!("{:<36}  {:<14}  {:>9}  {:>7}", "ID", "KIND", "INCLUSION", "CONTENT");
            println!("{}", "-".repeat(72));
            for node in nodes {
                println!(
                    "{:<36}  {:<14}  {:>9}  {:>7}",
                    node.id,
                    node.kind.as_str(),
                    node.inclusion.net,
                    node.content.net
                );
            }
            0
        }
        Err(e) => fail(e),
    }
}

fn cmd_review(api: &ContentApi, evidence: &str, user: &str, scores: ReviewScores, comments: Option<String>) -> i32 {
    let id = NodeId::from_string(evidence);
    match api
        .submit_peer_review(&id, user, scores, comments)
        .and_then(|_| api.review_aggregate(&id))
    {
        Ok(Some(aggregate)) => {
            println!(
                "Recorded review; {} reviews, overall {:.3}",
                aggregate.review_count, aggregate.overall_score
            );
            0
        }
        Ok(None) => {
            println!("Recorded review");
            0
        }
        Err(e) => fail(e),
    }
}

async fn cmd_tags(api: &ContentApi, node: &str, words: Vec<String>) -> i32 {
    match api.sync_tags(&NodeId::from_string(node), &keywords(words)).await {
        Ok(report) => {
            println!("Tagged with {} words; {} shared-tag links", report.tagged, report.shared);
            0
        }
        Err(e) => fail(e),
    }
}

fn cmd_delete(api: &ContentApi, node: &str) -> i32 {
    match api.delete(&NodeId::from_string(node)) {
        Ok(true) => {
            println!("Deleted {}", node);
            0
        }
        Ok(false) => {
            eprintln!("Error: node {} not found", node);
            1
        }
        Err(e) => fail(e),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let api = match open_api(cli.db, cli.config) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Word { word, user, definition } => cmd_word(&api, &word, &user, definition).await,
        Commands::Statement {
            text,
            user,
            tags,
            categories,
            parent,
        } => {
            let mut draft = StatementDraft::new(text, user)
                .with_keywords(keywords(tags))
                .with_categories(ids(categories));
            draft.parent_statement = parent.map(NodeId::from_string);
            cmd_create(&api, &draft).await
        }
        Commands::Question {
            text,
            user,
            tags,
            categories,
        } => {
            let mut draft = OpenQuestionDraft::new(text, user);
            draft.keywords = keywords(tags);
            draft.categories = ids(categories);
            cmd_create(&api, &draft).await
        }
        Commands::Answer {
            question,
            text,
            user,
            tags,
            categories,
        } => {
            let mut draft = AnswerDraft::new(NodeId::from_string(question), text, user);
            draft.keywords = keywords(tags);
            draft.categories = ids(categories);
            cmd_create(&api, &draft).await
        }
        Commands::Evidence {
            parent,
            title,
            url,
            user,
            tags,
            categories,
        } => {
            let mut draft = EvidenceDraft::new(NodeId::from_string(parent), title, url, user);
            draft.keywords = keywords(tags);
            draft.categories = ids(categories);
            cmd_create(&api, &draft).await
        }
        Commands::Category { words, user } => cmd_create(&api, &CategoryDraft::new(words, user)).await,
        Commands::Comment {
            node,
            text,
            user,
            reply_to,
        } => cmd_comment(&api, &node, &text, &user, reply_to).await,
        Commands::Vote {
            kind,
            node,
            user,
            down,
            content,
        } => cmd_vote(&api, kind, &node, &user, !down, content),
        Commands::Unvote {
            kind,
            node,
            user,
            content,
        } => cmd_unvote(&api, kind, &node, &user, content),
        Commands::Status { kind, node, user } => cmd_status(&api, kind, &node, &user),
        Commands::Show { node, user } => cmd_show(&api, &node, user.as_deref()),
        Commands::List { kind, limit } => cmd_list(&api, kind, limit),
        Commands::Review {
            evidence,
            user,
            quality,
            independence,
            relevance,
            comments,
        } => cmd_review(
            &api,
            &evidence,
            &user,
            ReviewScores::new(quality, independence, relevance),
            comments,
        ),
        Commands::Tags { node, words } => cmd_tags(&api, &node, words).await,
        Commands::Delete { node } => cmd_delete(&api, &node),
    };
    std::process::exit(code);
}
