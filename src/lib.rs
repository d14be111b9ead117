//! Multi-tenant memory as a service.
//!
//! memvault gives each user a private SQLite note store with FTS5 search and
//! exposes it over HTTP behind API-key auth and per-tier rate limits. A small
//! chat agent runtime sits on the same store.
//!
//! Memories carry two weights: a static `importance` set by the caller and a
//! dynamic `activation` that recall boosts and consolidation decays:
//!
//! | Event | Activation |
//! |-------|-----------|
//! | store | 1.0 |
//! | returned by recall | ×1.1, capped at 1.0 |
//! | consolidate | ×0.95; deleted below 0.01 |
//!
//! # Modules
//!
//! - [`config`]: TOML configuration and environment overrides
//! - [`db`]: per-user database files, schema, migrations, and health checks
//! - [`memory`]: recall, store, consolidate, and stats
//! - [`auth`]: hashed API keys and sliding-window quotas
//! - [`http`]: axum router, middleware, and handlers
//! - [`agent`]: LLM client, tools, and the chat loop
//! - [`server`]: HTTP server startup

pub mod agent;
pub mod auth;
pub mod config;
pub mod db;
pub mod http;
pub mod memory;
pub mod server;
