//! CLI `keys` commands: create, list, and revoke API keys.

use anyhow::{bail, Result};

use memvault::auth::keys::{KeyStore, NewApiKey, SqliteKeyStore};
use memvault::auth::rate_limit::Tier;
use memvault::config::MemvaultConfig;

fn open_store(config: &MemvaultConfig) -> Result<SqliteKeyStore> {
    SqliteKeyStore::open(config.resolved_keys_db())
}

/// Create a key and print the plaintext once.
pub fn create(config: &MemvaultConfig, user_id: &str, tier: Tier, name: Option<String>) -> Result<()> {
    let store = open_store(config)?;
    let (record, plaintext) = store.create_key(&NewApiKey {
        user_id: user_id.to_string(),
        tier,
        name,
    })?;

    println!("Created API key {} for {} ({} tier)", record.id, record.user_id, record.tier);
    println!();
    println!("  {plaintext}");
    println!();
    println!("Store it now: the key cannot be shown again.");
    Ok(())
}

pub fn list(config: &MemvaultConfig, user_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let keys = store.list_keys(user_id)?;

    if keys.is_empty() {
        println!("No API keys for {user_id}.");
        return Ok(());
    }

    println!("{:<38} {:<11} {:<8} {:<28} NAME", "ID", "TIER", "STATUS", "LAST USED");
    for key in &keys {
        println!(
            "{:<38} {:<11} {:<8} {:<28} {}",
            key.id,
            key.tier.as_str(),
            if key.revoked { "revoked" } else { "active" },
            key.last_used_at.as_deref().unwrap_or("never"),
            key.name.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

pub fn revoke(config: &MemvaultConfig, key_id: &str) -> Result<()> {
    let store = open_store(config)?;
    if !store.revoke_key(key_id)? {
        bail!("no API key with id {key_id}");
    }
    println!("Revoked API key {key_id}.");
    Ok(())
}
