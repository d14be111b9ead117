//! SQL DDL for the per-user memory store.
//!
//! Defines the `memories` table, its `memories_fts` (FTS5) shadow index with the
//! triggers that keep it in sync, and `schema_meta`. All DDL uses `IF NOT EXISTS`
//! for idempotent initialization.

use rusqlite::{params, Connection, Transaction, TransactionBehavior};

/// `schema_meta` key marking the FTS index as complete for every row in `memories`.
pub const FTS_READY_KEY: &str = "fts_ready";

const SCHEMA_SQL: &str = r#"
-- Core memory storage
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    type TEXT NOT NULL DEFAULT 'factual'
        CHECK(type IN ('factual','relational','procedural','episodic','semantic')),
    importance REAL NOT NULL DEFAULT 0.5 CHECK(importance >= 0.0 AND importance <= 1.0),
    activation REAL NOT NULL DEFAULT 1.0 CHECK(activation >= 0.0 AND activation <= 1.0),
    created_at TEXT NOT NULL,
    last_accessed TEXT,
    metadata TEXT
);

CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(type);
CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);

-- Full-text search. Keyed by the memories rowid.
CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    content,
    memory_id UNINDEXED
);

CREATE TRIGGER IF NOT EXISTS memories_fts_insert AFTER INSERT ON memories BEGIN
    INSERT INTO memories_fts (rowid, content, memory_id) VALUES (new.rowid, new.content, new.id);
END;

CREATE TRIGGER IF NOT EXISTS memories_fts_delete AFTER DELETE ON memories BEGIN
    DELETE FROM memories_fts WHERE rowid = old.rowid;
END;

CREATE TRIGGER IF NOT EXISTS memories_fts_update AFTER UPDATE OF content ON memories BEGIN
    DELETE FROM memories_fts WHERE rowid = old.rowid;
    INSERT INTO memories_fts (rowid, content, memory_id) VALUES (new.rowid, new.content, new.id);
END;

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
///
/// On first initialization the FTS index is backfilled from `memories` and marked
/// ready, so files written before the index existed become searchable. The DDL, the
/// readiness check and the backfill share one IMMEDIATE transaction, so handles
/// opening the same fresh file at once initialize it exactly once.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    tx.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    tx.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    if !fts_ready(&tx)? {
        repopulate_fts(&tx)?;
    }

    tx.commit()
}

/// Whether the FTS index is marked as covering every memory row.
pub fn fts_ready(conn: &Connection) -> rusqlite::Result<bool> {
    let ready: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = ?1",
            params![FTS_READY_KEY],
            |row| row.get(0),
        )
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    Ok(ready.as_deref() == Some("1"))
}

/// Drop and repopulate the FTS index from `memories`, then mark it ready.
///
/// Runs in its own IMMEDIATE transaction. Returns the number of rows indexed.
pub fn rebuild_fts(conn: &Connection) -> rusqlite::Result<usize> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let indexed = repopulate_fts(&tx)?;
    tx.commit()?;
    Ok(indexed)
}

/// Rebuild body; the caller holds the write transaction.
fn repopulate_fts(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM memories_fts", [])?;
    let indexed = conn.execute(
        "INSERT INTO memories_fts (rowid, content, memory_id) SELECT rowid, content, id FROM memories",
        [],
    )?;
    set_fts_ready(conn, true)?;
    Ok(indexed)
}

/// Flip the FTS readiness flag.
pub fn set_fts_ready(conn: &Connection, ready: bool) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES (?1, ?2)",
        params![FTS_READY_KEY, if ready { "1" } else { "0" }],
    )?;
    Ok(())
}
