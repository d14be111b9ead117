//! CLI `doctor` command: run diagnostics on one user's database and print a health report.

use anyhow::{Context, Result};

use memvault::config::MemvaultConfig;
use memvault::db;

pub fn doctor(config: &MemvaultConfig, user_id: &str) -> Result<()> {
    let db_path = db::user_db_path(&config.resolved_data_dir(), user_id)?;

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("It is created on the user's first request.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    let conn = db::open_database(&db_path)
        .context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn)
        .context("failed to run health check")?;

    println!("memvault Health Report ({user_id})");
    println!("==================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Row counts:");
    println!("  Memories:        {}", report.memory_count);
    println!("  FTS entries:     {}", report.fts_count);
    println!();
    if report.fts_ready && report.fts_count == report.memory_count {
        println!("Full-text index:   OK");
    } else if !report.fts_ready {
        println!("Full-text index:   NOT READY (recall uses substring search)");
    } else {
        println!("Full-text index:   OUT OF SYNC");
    }
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
    }

    if !report.fts_ready || report.fts_count != report.memory_count {
        println!();
        println!("Run `memvault reindex --user {user_id}` to rebuild the index.");
    }
    if !report.integrity_ok {
        println!();
        println!("Recovery steps:");
        println!("  1. Stop the server.");
        println!("  2. Restore {} from a backup.", db_path.display());
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
