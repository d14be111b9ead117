//! HTTP server startup.
//!
//! [`build_state`] wires the memory service and key store from config;
//! [`serve`] binds and runs until ctrl-c.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::auth::keys::SqliteKeyStore;
use crate::config::MemvaultConfig;
use crate::http::{self, AppState};
use crate::memory::service::MemoryService;

/// Build handler state from config. Creates the storage root and key database if needed.
pub fn build_state(config: &MemvaultConfig) -> Result<AppState> {
    let data_dir = config.resolved_data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
    tracing::info!(data_dir = %data_dir.display(), "memory storage ready");

    let keys_db = config.resolved_keys_db();
    let keys = SqliteKeyStore::open(&keys_db)?;
    tracing::info!(keys_db = %keys_db.display(), "key store ready");

    Ok(AppState::new(MemoryService::new(data_dir), Arc::new(keys))
        .with_tiers(config.auth.tiers)
        .with_quota_failure(config.auth.quota_failure))
}

/// Serve the HTTP API until ctrl-c.
pub async fn serve(config: MemvaultConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_state(&config)?;
    let router = http::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "memvault listening at http://{bind_addr}/api/v1/memory");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
