//! CLI `reindex` command: rebuild a user's full-text index from the memories table.

use anyhow::Result;

use memvault::config::MemvaultConfig;
use memvault::db::{self, schema};

pub fn reindex(config: &MemvaultConfig, user_id: &str) -> Result<()> {
    let path = db::user_db_path(&config.resolved_data_dir(), user_id)?;
    if !path.exists() {
        println!("No database for {user_id} at {}", path.display());
        return Ok(());
    }

    let conn = db::open_database(&path)?;
    let indexed = schema::rebuild_fts(&conn)?;
    println!("Rebuilt full-text index: {indexed} memories indexed.");
    Ok(())
}
