use anyhow::Result;

use memvault::config::MemvaultConfig;
use memvault::memory::service::MemoryService;
use memvault::memory::types::MemoryType;

/// Display memory statistics for one user.
pub fn stats(config: &MemvaultConfig, user_id: &str) -> Result<()> {
    let service = MemoryService::new(config.resolved_data_dir());
    let response = service.stats(user_id)?;

    println!("Memory Statistics ({user_id})");
    println!("{}", "=".repeat(40));
    println!("  Total memories:      {}", response.total_memories);
    println!("  Avg importance:      {:.3}", response.avg_importance);
    println!();

    println!("By Type:");
    for t in MemoryType::ALL {
        let count = response.by_type.get(t.as_str()).copied().unwrap_or(0);
        println!("  {:<12} {}", t.as_str(), count);
    }
    println!();

    if let Some(ref oldest) = response.oldest_memory {
        println!("Oldest memory:         {oldest}");
    }
    if let Some(ref newest) = response.newest_memory {
        println!("Newest memory:         {newest}");
    }

    Ok(())
}
