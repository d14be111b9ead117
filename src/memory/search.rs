use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, TransactionBehavior};
use serde::Serialize;
use std::time::Instant;

use super::types::{Memory, MemoryType, DEFAULT_RECALL_LIMIT};
use super::{memory_from_row, now_timestamp, MEMORY_COLUMNS};
use crate::db::schema;

/// Multiplier applied to activation on every recall hit.
pub const ACTIVATION_BOOST: f64 = 1.1;

// ── Public types ──────────────────────────────────────────────────────────────

/// A recall request, already validated.
#[derive(Debug, Clone)]
pub struct RecallQuery {
    pub query: String,
    pub limit: usize,
    /// Restrict results to these types. `None` means all types.
    pub types: Option<Vec<MemoryType>>,
}

impl RecallQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: DEFAULT_RECALL_LIMIT,
            types: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_types(mut self, types: Vec<MemoryType>) -> Self {
        self.types = Some(types);
        self
    }
}

/// Response from [`recall`].
#[derive(Debug, Serialize)]
pub struct RecallResponse {
    pub results: Vec<Memory>,
    pub took_ms: u64,
}

/// A strategy for selecting candidate memories. Both strategies order by
/// descending activation and apply the same type filter and limit.
pub trait SearchBackend: Sync {
    fn name(&self) -> &'static str;

    fn search(&self, conn: &Connection, query: &RecallQuery) -> Result<Vec<Memory>>;
}

/// FTS5 `MATCH` over content.
pub struct FullTextBackend;

/// Case-insensitive `LIKE` over raw content.
pub struct SubstringBackend;

static FULL_TEXT: FullTextBackend = FullTextBackend;
static SUBSTRING: SubstringBackend = SubstringBackend;

// ── Public API ────────────────────────────────────────────────────────────────

/// Pick the search strategy for this connection and query.
///
/// Full-text is used when the index is marked ready and the query has at least
/// one searchable token; otherwise the substring scan runs.
pub fn select_backend(conn: &Connection, query: &str) -> Result<&'static dyn SearchBackend> {
    if schema::fts_ready(conn)? && !escape_fts_query(query).is_empty() {
        Ok(&FULL_TEXT)
    } else {
        Ok(&SUBSTRING)
    }
}

/// Search, then boost activation and stamp `last_accessed` on every returned row.
///
/// Selection and boost run in one IMMEDIATE transaction, so the write lock is held
/// before the read. Returned records carry the boosted values.
pub fn recall(conn: &mut Connection, query: &RecallQuery) -> Result<RecallResponse> {
    let started = Instant::now();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let backend = select_backend(&tx, &query.query)?;
    let mut results = backend.search(&tx, query)?;

    let now = now_timestamp();
    boost_activation(&tx, &results, &now)?;
    tx.commit()?;

    for memory in &mut results {
        memory.activation = boosted(memory.activation);
        memory.last_accessed = Some(now.clone());
    }

    let took_ms = started.elapsed().as_millis() as u64;
    tracing::debug!(
        backend = backend.name(),
        results = results.len(),
        took_ms,
        "recall complete"
    );

    Ok(RecallResponse { results, took_ms })
}

// ── Strategies ────────────────────────────────────────────────────────────────

impl SearchBackend for FullTextBackend {
    fn name(&self) -> &'static str {
        "fts"
    }

    fn search(&self, conn: &Connection, query: &RecallQuery) -> Result<Vec<Memory>> {
        let escaped = escape_fts_query(&query.query);
        let types = type_strings(query);
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories_fts \
             JOIN memories m ON m.rowid = memories_fts.rowid \
             WHERE memories_fts MATCH ?1{} \
             ORDER BY m.activation DESC LIMIT ?2",
            type_clause(types.len(), 3)
        );

        let limit = query.limit as i64;
        let mut bound: Vec<&dyn ToSql> = vec![&escaped as &dyn ToSql, &limit as &dyn ToSql];
        bound.extend(types.iter().map(|t| t as &dyn ToSql));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(bound.as_slice(), memory_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl SearchBackend for SubstringBackend {
    fn name(&self) -> &'static str {
        "substring"
    }

    fn search(&self, conn: &Connection, query: &RecallQuery) -> Result<Vec<Memory>> {
        let pattern = escape_like(&query.query);
        let types = type_strings(query);
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories m \
             WHERE m.content LIKE '%' || ?1 || '%' ESCAPE '\\'{} \
             ORDER BY m.activation DESC LIMIT ?2",
            type_clause(types.len(), 3)
        );

        let limit = query.limit as i64;
        let mut bound: Vec<&dyn ToSql> = vec![&pattern as &dyn ToSql, &limit as &dyn ToSql];
        bound.extend(types.iter().map(|t| t as &dyn ToSql));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(bound.as_slice(), memory_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn boosted(activation: f64) -> f64 {
    (activation * ACTIVATION_BOOST).min(1.0)
}

/// Batch update activation and last_accessed for returned results.
fn boost_activation(conn: &Connection, results: &[Memory], now: &str) -> Result<()> {
    if results.is_empty() {
        return Ok(());
    }
    let mut stmt = conn.prepare(
        "UPDATE memories SET last_accessed = ?1, activation = MIN(activation * ?2, 1.0) WHERE id = ?3",
    )?;
    for memory in results {
        stmt.execute(params![now, ACTIVATION_BOOST, memory.id])?;
    }
    Ok(())
}

fn type_strings(query: &RecallQuery) -> Vec<&'static str> {
    query
        .types
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(MemoryType::as_str)
        .collect()
}

/// ` AND m.type IN (?N, ...)` with placeholders numbered from `first`, or empty.
fn type_clause(count: usize, first: usize) -> String {
    if count == 0 {
        return String::new();
    }
    let placeholders: Vec<String> = (first..first + count).map(|i| format!("?{i}")).collect();
    format!(" AND m.type IN ({})", placeholders.join(", "))
}

/// Escape a user query for FTS5 MATCH syntax.
///
/// Wraps each whitespace-delimited word in double quotes and joins with spaces
/// so FTS5 treats them as individual terms (implicit AND). Tokens with no
/// alphanumeric characters are dropped, since the tokenizer would discard them.
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| word.replace('"', ""))
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .map(|w| format!("\"{w}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape `%`, `_` and the escape character itself for a LIKE pattern.
fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
