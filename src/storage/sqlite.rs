//! SQLite storage backend

use super::traits::{GraphStore, OpenStore, StorageError, StorageResult, StoreTx};
use crate::config::StorageConfig;
use crate::graph::{
    CommentLink, ContentNode, Discussion, DiscussionId, NodeId, NodeKind, NodePair, PeerReview,
    ReviewAggregate, ReviewScores, SharedCategory, SharedTag, TagSource, TaggedEdge, VoteCounts,
    VoteDirection, VoteKind, VoteRecord,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const NODE_COLUMNS: &str = "id, kind, created_by, public_credit, created_at, updated_at, \
     inclusion_positive, inclusion_negative, content_positive, content_negative, properties_json";

/// SQLite-backed graph store
///
/// Uses a single SQLite database file. Thread-safe via internal mutex on the
/// connection; each [`StoreTx`] holds the lock for its whole lifetime, so a
/// transaction is also the unit of in-process serialization.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at `path` with explicit storage settings
    pub fn open_with(path: impl AsRef<Path>, config: &StorageConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::configure(&conn, config)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory_with(config: &StorageConfig) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn, config)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn configure(conn: &Connection, config: &StorageConfig) -> StorageResult<()> {
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        Ok(())
    }

    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Content nodes with their cached vote counters
            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                created_by TEXT NOT NULL,
                public_credit INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                inclusion_positive INTEGER NOT NULL DEFAULT 0,
                inclusion_negative INTEGER NOT NULL DEFAULT 0,
                inclusion_net INTEGER NOT NULL DEFAULT 0,
                content_positive INTEGER NOT NULL DEFAULT 0,
                content_negative INTEGER NOT NULL DEFAULT 0,
                content_net INTEGER NOT NULL DEFAULT 0,
                properties_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind);

            -- Vote records: the source of truth for the counters above
            CREATE TABLE IF NOT EXISTS votes (
                node_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                positive INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (node_id, user_id, kind)
            );

            -- Word text -> Word node
            CREATE TABLE IF NOT EXISTS words (
                word TEXT PRIMARY KEY,
                node_id TEXT NOT NULL UNIQUE
            );

            -- TAGGED edges
            CREATE TABLE IF NOT EXISTS tagged (
                node_id TEXT NOT NULL,
                word TEXT NOT NULL,
                frequency REAL NOT NULL,
                source TEXT NOT NULL,
                PRIMARY KEY (node_id, word)
            );
            CREATE INDEX IF NOT EXISTS idx_tagged_word ON tagged(word);

            -- SHARED_TAG edges, node_a < node_b
            CREATE TABLE IF NOT EXISTS shared_tags (
                node_a TEXT NOT NULL,
                node_b TEXT NOT NULL,
                word TEXT NOT NULL,
                strength REAL NOT NULL,
                PRIMARY KEY (node_a, node_b, word)
            );
            CREATE INDEX IF NOT EXISTS idx_shared_tags_b ON shared_tags(node_b);

            -- CATEGORIZED edges
            CREATE TABLE IF NOT EXISTS categorized (
                node_id TEXT NOT NULL,
                category_id TEXT NOT NULL,
                PRIMARY KEY (node_id, category_id)
            );
            CREATE INDEX IF NOT EXISTS idx_categorized_category ON categorized(category_id);

            -- SHARED_CATEGORY edges, node_a < node_b
            CREATE TABLE IF NOT EXISTS shared_categories (
                node_a TEXT NOT NULL,
                node_b TEXT NOT NULL,
                category_id TEXT NOT NULL,
                strength REAL NOT NULL,
                PRIMARY KEY (node_a, node_b, category_id)
            );
            CREATE INDEX IF NOT EXISTS idx_shared_categories_b ON shared_categories(node_b);

            -- COMPOSED_OF edges: category -> word
            CREATE TABLE IF NOT EXISTS category_words (
                category_id TEXT NOT NULL,
                word TEXT NOT NULL,
                PRIMARY KEY (category_id, word)
            );
            CREATE INDEX IF NOT EXISTS idx_category_words_word ON category_words(word);

            CREATE TABLE IF NOT EXISTS peer_reviews (
                evidence_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                quality INTEGER NOT NULL,
                independence INTEGER NOT NULL,
                relevance INTEGER NOT NULL,
                comments TEXT,
                created_at TEXT NOT NULL,
                PRIMARY KEY (evidence_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS review_aggregates (
                evidence_id TEXT PRIMARY KEY,
                avg_quality REAL NOT NULL,
                avg_independence REAL NOT NULL,
                avg_relevance REAL NOT NULL,
                overall_score REAL NOT NULL,
                review_count INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS discussions (
                id TEXT PRIMARY KEY,
                node_id TEXT NOT NULL UNIQUE,
                node_kind TEXT NOT NULL,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS comments (
                comment_id TEXT PRIMARY KEY,
                discussion_id TEXT NOT NULL,
                parent_comment_id TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_comments_discussion ON comments(discussion_id);

            CREATE TABLE IF NOT EXISTS visibility_preferences (
                user_id TEXT NOT NULL,
                node_id TEXT NOT NULL,
                visible INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, node_id)
            );

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-transaction leaves nothing committed: the guard's
        // SqliteTx rolled back on unwind, so the connection is reusable.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self, begin: &str) -> StorageResult<Box<dyn StoreTx + '_>> {
        let conn = self.lock();
        conn.execute_batch(begin)?;
        Ok(Box::new(SqliteTx { conn, open: true }))
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with(path, &StorageConfig::default())
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::open_in_memory_with(&StorageConfig::default())
    }
}

impl GraphStore for SqliteStore {
    fn begin(&self) -> StorageResult<Box<dyn StoreTx + '_>> {
        self.start("BEGIN IMMEDIATE")
    }

    fn read(&self) -> StorageResult<Box<dyn StoreTx + '_>> {
        self.start("BEGIN DEFERRED")
    }
}

/// An open SQLite transaction holding the connection lock
struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    open: bool,
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!("rollback failed: {}", e);
            }
        }
    }
}

// === Row conversion ===

struct NodeRow {
    id: String,
    kind: String,
    created_by: String,
    public_credit: bool,
    created_at: String,
    updated_at: String,
    inclusion_positive: i64,
    inclusion_negative: i64,
    content_positive: i64,
    content_negative: i64,
    properties_json: String,
}

fn read_node_row(row: &Row<'_>) -> rusqlite::Result<NodeRow> {
    Ok(NodeRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        created_by: row.get(2)?,
        public_credit: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        inclusion_positive: row.get(6)?,
        inclusion_negative: row.get(7)?,
        content_positive: row.get(8)?,
        content_negative: row.get(9)?,
        properties_json: row.get(10)?,
    })
}

fn row_to_node(row: NodeRow) -> StorageResult<ContentNode> {
    Ok(ContentNode {
        id: NodeId::from_string(row.id),
        kind: parse_kind(&row.kind)?,
        created_by: row.created_by,
        public_credit: row.public_credit,
        created_at: parse_time(&row.created_at)?,
        updated_at: parse_time(&row.updated_at)?,
        inclusion: VoteCounts::new(row.inclusion_positive, row.inclusion_negative),
        content: VoteCounts::new(row.content_positive, row.content_negative),
        properties: serde_json::from_str(&row.properties_json)?,
    })
}

fn parse_time(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::DateParse(e.to_string()))
}

fn parse_kind(raw: &str) -> StorageResult<NodeKind> {
    NodeKind::parse(raw).ok_or_else(|| StorageError::Corrupt(format!("unknown node kind '{}'", raw)))
}

fn parse_vote_kind(raw: &str) -> StorageResult<VoteKind> {
    VoteKind::parse(raw).ok_or_else(|| StorageError::Corrupt(format!("unknown vote kind '{}'", raw)))
}

fn parse_source(raw: &str) -> StorageResult<TagSource> {
    TagSource::parse(raw).ok_or_else(|| StorageError::Corrupt(format!("unknown tag source '{}'", raw)))
}

fn parse_score(raw: i64) -> StorageResult<u8> {
    u8::try_from(raw).map_err(|_| StorageError::Corrupt(format!("review score {} out of range", raw)))
}

fn parse_pair(a: String, b: String) -> StorageResult<NodePair> {
    NodePair::new(NodeId::from_string(a), NodeId::from_string(b))
        .ok_or_else(|| StorageError::Corrupt("shared edge links a node to itself".to_string()))
}

fn counter_prefix(kind: VoteKind) -> &'static str {
    match kind {
        VoteKind::Inclusion => "inclusion",
        VoteKind::Content => "content",
    }
}

impl SqliteTx<'_> {
    fn query_nodes(&self, sql: &str, params: impl rusqlite::Params) -> StorageResult<Vec<ContentNode>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, read_node_row)?;
        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row_to_node(row?)?);
        }
        Ok(nodes)
    }

    fn query_tags(&self, sql: &str, key: &str) -> StorageResult<Vec<TaggedEdge>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![key], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut tags = Vec::new();
        for row in rows {
            let (node_id, word, frequency, source) = row?;
            tags.push(TaggedEdge {
                node_id: NodeId::from_string(node_id),
                word,
                frequency,
                source: parse_source(&source)?,
            });
        }
        Ok(tags)
    }

    fn query_ids(&self, sql: &str, key: &str) -> StorageResult<Vec<NodeId>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(NodeId::from_string(row?));
        }
        Ok(ids)
    }
}

fn read_discussion(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn row_to_discussion(raw: (String, String, String, String, String)) -> StorageResult<Discussion> {
    let (id, node_id, node_kind, created_by, created_at) = raw;
    Ok(Discussion {
        id: DiscussionId::from_string(id),
        node_id: NodeId::from_string(node_id),
        node_kind: parse_kind(&node_kind)?,
        created_by,
        created_at: parse_time(&created_at)?,
    })
}

#[allow(clippy::type_complexity)]
fn read_review(row: &Row<'_>) -> rusqlite::Result<(String, String, i64, i64, i64, Option<String>, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn row_to_review(raw: (String, String, i64, i64, i64, Option<String>, String)) -> StorageResult<PeerReview> {
    let (evidence_id, user_id, quality, independence, relevance, comments, created_at) = raw;
    Ok(PeerReview {
        evidence_id: NodeId::from_string(evidence_id),
        user_id,
        scores: ReviewScores::new(parse_score(quality)?, parse_score(independence)?, parse_score(relevance)?),
        comments,
        created_at: parse_time(&created_at)?,
    })
}

impl StoreTx for SqliteTx<'_> {
    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.open = false;
        Ok(())
    }

    // === Nodes ===

    fn insert_node(&self, node: &ContentNode) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO nodes (id, kind, created_by, public_credit, created_at, updated_at,
                               inclusion_positive, inclusion_negative, inclusion_net,
                               content_positive, content_negative, content_net, properties_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                node.id.as_str(),
                node.kind.as_str(),
                node.created_by,
                node.public_credit,
                node.created_at.to_rfc3339(),
                node.updated_at.to_rfc3339(),
                node.inclusion.positive,
                node.inclusion.negative,
                node.inclusion.net,
                node.content.positive,
                node.content.negative,
                node.content.net,
                serde_json::to_string(&node.properties)?,
            ],
        )?;
        Ok(())
    }

    fn load_node(&self, id: &NodeId) -> StorageResult<Option<ContentNode>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM nodes WHERE id = ?1", NODE_COLUMNS),
                params![id.as_str()],
                read_node_row,
            )
            .optional()?;
        row.map(row_to_node).transpose()
    }

    fn update_node(&self, node: &ContentNode) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE nodes SET public_credit = ?1, updated_at = ?2, properties_json = ?3 WHERE id = ?4",
            params![
                node.public_credit,
                node.updated_at.to_rfc3339(),
                serde_json::to_string(&node.properties)?,
                node.id.as_str(),
            ],
        )?;
        Ok(())
    }

    fn write_counts(
        &self,
        id: &NodeId,
        kind: VoteKind,
        counts: VoteCounts,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let prefix = counter_prefix(kind);
        self.conn.execute(
            &format!(
                "UPDATE nodes SET {p}_positive = ?1, {p}_negative = ?2, {p}_net = ?3, updated_at = ?4 WHERE id = ?5",
                p = prefix
            ),
            params![counts.positive, counts.negative, counts.net, updated_at.to_rfc3339(), id.as_str()],
        )?;
        Ok(())
    }

    fn delete_node(&self, id: &NodeId) -> StorageResult<bool> {
        let key = id.as_str();
        // Dependent rows first, the node row last
        self.conn.execute("DELETE FROM votes WHERE node_id = ?1", params![key])?;
        self.conn.execute("DELETE FROM tagged WHERE node_id = ?1", params![key])?;
        self.conn.execute(
            "DELETE FROM shared_tags WHERE node_a = ?1 OR node_b = ?1",
            params![key],
        )?;
        self.conn.execute(
            "DELETE FROM categorized WHERE node_id = ?1 OR category_id = ?1",
            params![key],
        )?;
        self.conn.execute(
            "DELETE FROM shared_categories WHERE node_a = ?1 OR node_b = ?1 OR category_id = ?1",
            params![key],
        )?;
        self.conn.execute("DELETE FROM category_words WHERE category_id = ?1", params![key])?;
        self.conn.execute("DELETE FROM words WHERE node_id = ?1", params![key])?;
        self.conn.execute("DELETE FROM peer_reviews WHERE evidence_id = ?1", params![key])?;
        self.conn.execute("DELETE FROM review_aggregates WHERE evidence_id = ?1", params![key])?;
        self.conn.execute("DELETE FROM discussions WHERE node_id = ?1", params![key])?;
        self.conn.execute("DELETE FROM comments WHERE comment_id = ?1", params![key])?;
        self.conn.execute("DELETE FROM visibility_preferences WHERE node_id = ?1", params![key])?;
        let rows = self.conn.execute("DELETE FROM nodes WHERE id = ?1", params![key])?;
        Ok(rows > 0)
    }

    fn list_nodes(&self, kind: Option<NodeKind>, limit: usize) -> StorageResult<Vec<ContentNode>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_nodes(
            &format!(
                "SELECT {} FROM nodes WHERE (?1 IS NULL OR kind = ?1) ORDER BY created_at, id LIMIT ?2",
                NODE_COLUMNS
            ),
            params![kind.map(|k| k.as_str()), limit],
        )
    }

    // === Votes ===

    fn load_vote(&self, node_id: &NodeId, user_id: &str, kind: VoteKind) -> StorageResult<Option<VoteRecord>> {
        let row: Option<(bool, String)> = self
            .conn
            .query_row(
                "SELECT positive, updated_at FROM votes WHERE node_id = ?1 AND user_id = ?2 AND kind = ?3",
                params![node_id.as_str(), user_id, kind.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((positive, updated_at)) = row else {
            return Ok(None);
        };

        Ok(Some(VoteRecord {
            node_id: node_id.clone(),
            user_id: user_id.to_string(),
            kind,
            direction: VoteDirection::from_positive(positive),
            updated_at: parse_time(&updated_at)?,
        }))
    }

    fn upsert_vote(&self, vote: &VoteRecord) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO votes (node_id, user_id, kind, positive, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(node_id, user_id, kind) DO UPDATE SET
                positive = excluded.positive,
                updated_at = excluded.updated_at
            "#,
            params![
                vote.node_id.as_str(),
                vote.user_id,
                vote.kind.as_str(),
                vote.direction.is_positive(),
                vote.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_vote(&self, node_id: &NodeId, user_id: &str, kind: VoteKind) -> StorageResult<bool> {
        let rows = self.conn.execute(
            "DELETE FROM votes WHERE node_id = ?1 AND user_id = ?2 AND kind = ?3",
            params![node_id.as_str(), user_id, kind.as_str()],
        )?;
        Ok(rows > 0)
    }

    fn tally_votes(&self, node_id: &NodeId, kind: VoteKind) -> StorageResult<VoteCounts> {
        let (positive, negative): (i64, i64) = self.conn.query_row(
            r#"
            SELECT COALESCE(SUM(positive), 0), COALESCE(SUM(1 - positive), 0)
            FROM votes WHERE node_id = ?1 AND kind = ?2
            "#,
            params![node_id.as_str(), kind.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(VoteCounts::new(positive, negative))
    }

    // === Words ===

    fn word_node(&self, word: &str) -> StorageResult<Option<NodeId>> {
        let id: Option<String> = self
            .conn
            .query_row("SELECT node_id FROM words WHERE word = ?1", params![word], |row| row.get(0))
            .optional()?;
        Ok(id.map(NodeId::from_string))
    }

    fn index_word(&self, word: &str, node_id: &NodeId) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO words (word, node_id) VALUES (?1, ?2)",
            params![word, node_id.as_str()],
        )?;
        Ok(())
    }

    // === Tags ===

    fn clear_tags(&self, node_id: &NodeId) -> StorageResult<usize> {
        let tagged = self
            .conn
            .execute("DELETE FROM tagged WHERE node_id = ?1", params![node_id.as_str()])?;
        let shared = self.conn.execute(
            "DELETE FROM shared_tags WHERE node_a = ?1 OR node_b = ?1",
            params![node_id.as_str()],
        )?;
        Ok(tagged + shared)
    }

    fn insert_tag(&self, tag: &TaggedEdge) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO tagged (node_id, word, frequency, source)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(node_id, word) DO UPDATE SET
                frequency = excluded.frequency,
                source = excluded.source
            "#,
            params![tag.node_id.as_str(), tag.word, tag.frequency, tag.source.as_str()],
        )?;
        Ok(())
    }

    fn tags_of(&self, node_id: &NodeId) -> StorageResult<Vec<TaggedEdge>> {
        self.query_tags(
            "SELECT node_id, word, frequency, source FROM tagged WHERE node_id = ?1 ORDER BY word",
            node_id.as_str(),
        )
    }

    fn nodes_tagged_with(&self, word: &str) -> StorageResult<Vec<TaggedEdge>> {
        self.query_tags(
            "SELECT node_id, word, frequency, source FROM tagged WHERE word = ?1 ORDER BY node_id",
            word,
        )
    }

    fn merge_shared_tag(&self, edge: &SharedTag) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO shared_tags (node_a, node_b, word, strength)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(node_a, node_b, word) DO UPDATE SET
                strength = shared_tags.strength + excluded.strength
            "#,
            params![
                edge.pair.low().as_str(),
                edge.pair.high().as_str(),
                edge.word,
                edge.strength,
            ],
        )?;
        Ok(())
    }

    fn shared_tags_of(&self, node_id: &NodeId) -> StorageResult<Vec<SharedTag>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT node_a, node_b, word, strength FROM shared_tags
            WHERE node_a = ?1 OR node_b = ?1
            ORDER BY strength DESC, word, node_a, node_b
            "#,
        )?;
        let rows = stmt.query_map(params![node_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;
        let mut edges = Vec::new();
        for row in rows {
            let (a, b, word, strength) = row?;
            edges.push(SharedTag {
                pair: parse_pair(a, b)?,
                word,
                strength,
            });
        }
        Ok(edges)
    }

    // === Categories ===

    fn clear_categories(&self, node_id: &NodeId) -> StorageResult<usize> {
        let categorized = self
            .conn
            .execute("DELETE FROM categorized WHERE node_id = ?1", params![node_id.as_str()])?;
        let shared = self.conn.execute(
            "DELETE FROM shared_categories WHERE node_a = ?1 OR node_b = ?1",
            params![node_id.as_str()],
        )?;
        Ok(categorized + shared)
    }

    fn insert_category(&self, node_id: &NodeId, category_id: &NodeId) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO categorized (node_id, category_id) VALUES (?1, ?2)",
            params![node_id.as_str(), category_id.as_str()],
        )?;
        Ok(())
    }

    fn categories_of(&self, node_id: &NodeId) -> StorageResult<Vec<NodeId>> {
        self.query_ids(
            "SELECT category_id FROM categorized WHERE node_id = ?1 ORDER BY category_id",
            node_id.as_str(),
        )
    }

    fn nodes_in_category(&self, category_id: &NodeId) -> StorageResult<Vec<NodeId>> {
        self.query_ids(
            "SELECT node_id FROM categorized WHERE category_id = ?1 ORDER BY node_id",
            category_id.as_str(),
        )
    }

    fn merge_shared_category(&self, edge: &SharedCategory) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO shared_categories (node_a, node_b, category_id, strength)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(node_a, node_b, category_id) DO UPDATE SET
                strength = shared_categories.strength + excluded.strength
            "#,
            params![
                edge.pair.low().as_str(),
                edge.pair.high().as_str(),
                edge.category_id.as_str(),
                edge.strength,
            ],
        )?;
        Ok(())
    }

    fn shared_categories_of(&self, node_id: &NodeId) -> StorageResult<Vec<SharedCategory>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT node_a, node_b, category_id, strength FROM shared_categories
            WHERE node_a = ?1 OR node_b = ?1
            ORDER BY strength DESC, category_id, node_a, node_b
            "#,
        )?;
        let rows = stmt.query_map(params![node_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;
        let mut edges = Vec::new();
        for row in rows {
            let (a, b, category_id, strength) = row?;
            edges.push(SharedCategory {
                pair: parse_pair(a, b)?,
                category_id: NodeId::from_string(category_id),
                strength,
            });
        }
        Ok(edges)
    }

    fn set_category_words(&self, category_id: &NodeId, words: &[String]) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM category_words WHERE category_id = ?1",
            params![category_id.as_str()],
        )?;
        for word in words {
            self.conn.execute(
                "INSERT OR IGNORE INTO category_words (category_id, word) VALUES (?1, ?2)",
                params![category_id.as_str(), word],
            )?;
        }
        Ok(())
    }

    fn category_words(&self, category_id: &NodeId) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT word FROM category_words WHERE category_id = ?1 ORDER BY word")?;
        let rows = stmt.query_map(params![category_id.as_str()], |row| row.get::<_, String>(0))?;
        let mut words = Vec::new();
        for row in rows {
            words.push(row?);
        }
        Ok(words)
    }

    fn categories_using_word(&self, word: &str) -> StorageResult<Vec<NodeId>> {
        self.query_ids(
            "SELECT category_id FROM category_words WHERE word = ?1 ORDER BY category_id",
            word,
        )
    }

    fn definitions_of(&self, word: &str) -> StorageResult<Vec<NodeId>> {
        self.query_ids(
            "SELECT id FROM nodes WHERE kind = 'definition' \
             AND json_extract(properties_json, '$.word') = ?1 ORDER BY created_at, id",
            word,
        )
    }

    // === Peer reviews ===

    fn load_review(&self, evidence_id: &NodeId, user_id: &str) -> StorageResult<Option<PeerReview>> {
        let raw = self
            .conn
            .query_row(
                r#"
                SELECT evidence_id, user_id, quality, independence, relevance, comments, created_at
                FROM peer_reviews WHERE evidence_id = ?1 AND user_id = ?2
                "#,
                params![evidence_id.as_str(), user_id],
                read_review,
            )
            .optional()?;
        raw.map(row_to_review).transpose()
    }

    fn insert_review(&self, review: &PeerReview) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO peer_reviews (evidence_id, user_id, quality, independence, relevance, comments, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                review.evidence_id.as_str(),
                review.user_id,
                review.scores.quality,
                review.scores.independence,
                review.scores.relevance,
                review.comments,
                review.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn reviews_of(&self, evidence_id: &NodeId) -> StorageResult<Vec<PeerReview>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT evidence_id, user_id, quality, independence, relevance, comments, created_at
            FROM peer_reviews WHERE evidence_id = ?1 ORDER BY created_at, user_id
            "#,
        )?;
        let rows = stmt.query_map(params![evidence_id.as_str()], read_review)?;
        let mut reviews = Vec::new();
        for row in rows {
            reviews.push(row_to_review(row?)?);
        }
        Ok(reviews)
    }

    fn save_review_aggregate(&self, aggregate: &ReviewAggregate) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO review_aggregates (evidence_id, avg_quality, avg_independence, avg_relevance,
                                           overall_score, review_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(evidence_id) DO UPDATE SET
                avg_quality = excluded.avg_quality,
                avg_independence = excluded.avg_independence,
                avg_relevance = excluded.avg_relevance,
                overall_score = excluded.overall_score,
                review_count = excluded.review_count
            "#,
            params![
                aggregate.evidence_id.as_str(),
                aggregate.avg_quality,
                aggregate.avg_independence,
                aggregate.avg_relevance,
                aggregate.overall_score,
                aggregate.review_count,
            ],
        )?;
        Ok(())
    }

    fn load_review_aggregate(&self, evidence_id: &NodeId) -> StorageResult<Option<ReviewAggregate>> {
        let aggregate = self
            .conn
            .query_row(
                r#"
                SELECT avg_quality, avg_independence, avg_relevance, overall_score, review_count
                FROM review_aggregates WHERE evidence_id = ?1
                "#,
                params![evidence_id.as_str()],
                |row| {
                    Ok(ReviewAggregate {
                        evidence_id: evidence_id.clone(),
                        avg_quality: row.get(0)?,
                        avg_independence: row.get(1)?,
                        avg_relevance: row.get(2)?,
                        overall_score: row.get(3)?,
                        review_count: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(aggregate)
    }

    // === Discussions ===

    fn insert_discussion(&self, discussion: &Discussion) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO discussions (id, node_id, node_kind, created_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                discussion.id.as_str(),
                discussion.node_id.as_str(),
                discussion.node_kind.as_str(),
                discussion.created_by,
                discussion.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn discussion_for(&self, node_id: &NodeId) -> StorageResult<Option<Discussion>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, node_id, node_kind, created_by, created_at FROM discussions WHERE node_id = ?1",
                params![node_id.as_str()],
                read_discussion,
            )
            .optional()?;
        raw.map(row_to_discussion).transpose()
    }

    fn load_discussion(&self, id: &DiscussionId) -> StorageResult<Option<Discussion>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, node_id, node_kind, created_by, created_at FROM discussions WHERE id = ?1",
                params![id.as_str()],
                read_discussion,
            )
            .optional()?;
        raw.map(row_to_discussion).transpose()
    }

    fn link_comment(&self, link: &CommentLink) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO comments (comment_id, discussion_id, parent_comment_id) VALUES (?1, ?2, ?3)",
            params![
                link.comment_id.as_str(),
                link.discussion_id.as_str(),
                link.parent_comment_id.as_ref().map(|id| id.as_str()),
            ],
        )?;
        Ok(())
    }

    fn comment_link(&self, comment_id: &NodeId) -> StorageResult<Option<CommentLink>> {
        let row: Option<(String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT discussion_id, parent_comment_id FROM comments WHERE comment_id = ?1",
                params![comment_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row.map(|(discussion_id, parent)| CommentLink {
            comment_id: comment_id.clone(),
            discussion_id: DiscussionId::from_string(discussion_id),
            parent_comment_id: parent.map(NodeId::from_string),
        }))
    }

    fn comments_in(&self, discussion_id: &DiscussionId) -> StorageResult<Vec<CommentLink>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.comment_id, c.parent_comment_id FROM comments c
            LEFT JOIN nodes n ON n.id = c.comment_id
            WHERE c.discussion_id = ?1
            ORDER BY n.created_at, c.comment_id
            "#,
        )?;
        let rows = stmt.query_map(params![discussion_id.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;
        let mut links = Vec::new();
        for row in rows {
            let (comment_id, parent) = row?;
            links.push(CommentLink {
                comment_id: NodeId::from_string(comment_id),
                discussion_id: discussion_id.clone(),
                parent_comment_id: parent.map(NodeId::from_string),
            });
        }
        Ok(links)
    }

    // === Visibility preferences ===

    fn set_visibility(&self, user_id: &str, node_id: &NodeId, visible: bool) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO visibility_preferences (user_id, node_id, visible, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, node_id) DO UPDATE SET
                visible = excluded.visible,
                updated_at = excluded.updated_at
            "#,
            params![user_id, node_id.as_str(), visible, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn visibility_for(&self, user_id: &str, node_id: &NodeId) -> StorageResult<Option<bool>> {
        let visible = self
            .conn
            .query_row(
                "SELECT visible FROM visibility_preferences WHERE user_id = ?1 AND node_id = ?2",
                params![user_id, node_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(visible)
    }
}
