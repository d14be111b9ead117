//! CLI `consolidate` command: one decay-and-forget pass for a user.

use anyhow::Result;

use memvault::config::MemvaultConfig;
use memvault::memory::service::MemoryService;

pub fn consolidate(config: &MemvaultConfig, user_id: &str) -> Result<()> {
    let service = MemoryService::new(config.resolved_data_dir());

    println!("Consolidating memories for {user_id}...");
    let stats = service.consolidate(user_id)?;

    println!("  Before:     {}", stats.memories_before);
    println!("  After:      {}", stats.memories_after);
    println!("  Forgotten:  {}", stats.forgotten);
    if stats.forgotten == 0 {
        println!("No memories fell below the activation floor.");
    }
    Ok(())
}
