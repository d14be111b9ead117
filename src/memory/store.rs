//! Write path: insert a memory row and sync its full-text index entry.
//!
//! The FTS triggers already index every insert. [`store_memory`] re-syncs the entry
//! explicitly anyway so a file whose triggers were lost still gets indexed; that
//! sync is best-effort and its failure only logs.

use anyhow::Result;
use rusqlite::{params, Connection};
use serde::Serialize;

use super::now_timestamp;
use super::types::NewMemory;

/// Result returned from a store operation.
#[derive(Debug, Serialize)]
pub struct StoreMemoryResult {
    /// UUID of the stored memory.
    pub id: String,
    pub success: bool,
}

/// Insert a new memory with activation 1.0, then sync its FTS entry.
///
/// Bounds on content length and importance are the caller's responsibility; the
/// table's CHECK constraints reject out-of-range importance.
pub fn store_memory(conn: &mut Connection, memory: &NewMemory) -> Result<StoreMemoryResult> {
    let id = uuid::Uuid::now_v7().to_string();
    let rowid = insert_memory(conn, &id, memory)?;

    if let Err(e) = sync_fts(conn, rowid, &id, &memory.content) {
        tracing::warn!(id = %id, error = %e, "fts sync failed; row stored without explicit index sync");
    }

    tracing::debug!(id = %id, memory_type = %memory.memory_type, "memory stored");
    Ok(StoreMemoryResult { id, success: true })
}

/// Insert a new memory row. Returns the SQLite rowid for FTS sync.
fn insert_memory(conn: &Connection, id: &str, memory: &NewMemory) -> Result<i64> {
    let now = now_timestamp();
    let metadata_json = memory
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO memories (id, content, type, importance, activation, created_at, metadata) \
         VALUES (?1, ?2, ?3, ?4, 1.0, ?5, ?6)",
        params![
            id,
            memory.content,
            memory.memory_type.as_str(),
            memory.importance,
            now,
            metadata_json,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Replace the FTS entry for `rowid` with the given content. Idempotent, so it is
/// safe to run after the insert trigger has already indexed the row.
fn sync_fts(conn: &mut Connection, rowid: i64, id: &str, content: &str) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM memories_fts WHERE rowid = ?1", params![rowid])?;
    tx.execute(
        "INSERT INTO memories_fts (rowid, content, memory_id) VALUES (?1, ?2, ?3)",
        params![rowid, content, id],
    )?;
    tx.commit()?;
    Ok(())
}
