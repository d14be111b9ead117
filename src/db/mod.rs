pub mod migrations;
pub mod schema;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Longest user id accepted as a database file name.
pub const USER_ID_MAX_LEN: usize = 128;

/// Open (or create) a memory database at the given path, with schema
/// initialized and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.busy_timeout(std::time::Duration::from_millis(5000))?;
    // WAL lets readers proceed while a consolidate or store holds the write lock.
    // The mode persists in the file, so only the first opener switches it.
    let journal_mode: String = conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?;
    if !journal_mode.eq_ignore_ascii_case("wal") {
        conn.pragma_update(None, "journal_mode", "WAL")?;
    }

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;

    tracing::debug!(path = %path.display(), "database opened");
    Ok(conn)
}

/// Path of a user's database under `data_dir`. The user id is the file stem, so it
/// is restricted to `[A-Za-z0-9_-]`.
pub fn user_db_path(data_dir: &Path, user_id: &str) -> Result<PathBuf> {
    validate_user_id(user_id)?;
    Ok(data_dir.join("users").join(format!("{user_id}.db")))
}

/// A user's private agent workspace under `workspace_root`. Validated like
/// [`user_db_path`], so one user's file tools never see another's files.
pub fn user_workspace_path(workspace_root: &Path, user_id: &str) -> Result<PathBuf> {
    validate_user_id(user_id)?;
    Ok(workspace_root.join(user_id))
}

/// Open a user's database, creating it on first use.
pub fn open_user_database(data_dir: &Path, user_id: &str) -> Result<Connection> {
    let path = user_db_path(data_dir, user_id)?;
    open_database(&path)
}

pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() || user_id.len() > USER_ID_MAX_LEN {
        bail!("user id must be 1-{USER_ID_MAX_LEN} characters");
    }
    if !user_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        bail!("user id may only contain ASCII letters, digits, '-' and '_': {user_id}");
    }
    Ok(())
}

/// Diagnostics for one user database.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub schema_version: u32,
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub fts_ready: bool,
    pub memory_count: u64,
    pub fts_count: u64,
}

/// Run `PRAGMA integrity_check` and gather row counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let schema_version = migrations::get_schema_version(conn)?;

    let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let integrity_ok = integrity == "ok";

    let memory_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
    let fts_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM memories_fts", [], |row| row.get(0))?;

    Ok(HealthReport {
        schema_version,
        integrity_ok,
        integrity_details: integrity,
        fts_ready: schema::fts_ready(conn)?,
        memory_count: memory_count as u64,
        fts_count: fts_count as u64,
    })
}

/// Open an in-memory database for testing.
#[cfg(test)]
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;
    Ok(conn)
}
