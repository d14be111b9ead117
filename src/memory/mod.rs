pub mod consolidate;
pub mod search;
pub mod service;
pub mod stats;
pub mod store;
pub mod types;

use rusqlite::Row;

use types::{Memory, MemoryType};

/// Column list matching [`memory_from_row`].
pub(crate) const MEMORY_COLUMNS: &str =
    "m.id, m.content, m.type, m.importance, m.activation, m.created_at, m.last_accessed, m.metadata";

/// Current time in the fixed-width RFC 3339 form used for every stored timestamp,
/// so `MIN`/`MAX` over the text column order chronologically.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Map a row selected with [`MEMORY_COLUMNS`] into a [`Memory`].
pub(crate) fn memory_from_row(row: &Row<'_>) -> rusqlite::Result<Memory> {
    let type_str: String = row.get(2)?;
    let memory_type: MemoryType = type_str.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    let metadata_str: Option<String> = row.get(7)?;
    Ok(Memory {
        id: row.get(0)?,
        content: row.get(1)?,
        memory_type,
        importance: row.get(3)?,
        activation: row.get(4)?,
        created_at: row.get(5)?,
        last_accessed: row.get(6)?,
        metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
    })
}
