//! Per-user facade over the memory operations.
//!
//! [`MemoryService`] owns only the storage root. Every call opens a fresh handle
//! to the caller's database file and drops it before returning; there is no pool
//! and no handle shared across calls. All methods block and should be run on
//! `spawn_blocking` from async code.

use anyhow::Result;
use std::path::{Path, PathBuf};

use super::consolidate::{self, ConsolidationStats};
use super::search::{self, RecallQuery, RecallResponse};
use super::stats::{self, StatsResponse};
use super::store::{self, StoreMemoryResult};
use super::types::NewMemory;
use crate::db;

#[derive(Debug, Clone)]
pub struct MemoryService {
    data_dir: PathBuf,
}

impl MemoryService {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn recall(&self, user_id: &str, query: &RecallQuery) -> Result<RecallResponse> {
        let mut conn = db::open_user_database(&self.data_dir, user_id)?;
        search::recall(&mut conn, query)
    }

    pub fn store(&self, user_id: &str, memory: &NewMemory) -> Result<StoreMemoryResult> {
        let mut conn = db::open_user_database(&self.data_dir, user_id)?;
        store::store_memory(&mut conn, memory)
    }

    pub fn consolidate(&self, user_id: &str) -> Result<ConsolidationStats> {
        let mut conn = db::open_user_database(&self.data_dir, user_id)?;
        consolidate::consolidate(&mut conn)
    }

    pub fn stats(&self, user_id: &str) -> Result<StatsResponse> {
        let conn = db::open_user_database(&self.data_dir, user_id)?;
        stats::memory_stats(&conn)
    }
}
