//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`].

use rusqlite::{Connection, Transaction, TransactionBehavior};

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

/// Update the stored schema version.
fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

/// Run any pending forward-only migrations.
///
/// Each step runs in its own IMMEDIATE transaction and re-reads the version under
/// the write lock, so concurrent openers never apply the same step twice.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let current = get_schema_version(conn)?;
    tracing::debug!(schema_version = current, target = CURRENT_SCHEMA_VERSION, "checking migrations");
    if current >= CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    loop {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let version = get_schema_version(&tx)?;
        if version >= CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                return Ok(());
            }
        }
        update_schema_version(&tx, next)?;
        tx.commit()?;
    }
}

/// Migration v1 → v2: index activation, the recall ordering key.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_memories_activation ON memories(activation DESC);",
    )
}
