//! API-key storage.
//!
//! [`KeyStore`] is the seam to whatever holds the key table; the hosted
//! deployment can back it with a managed database. [`SqliteKeyStore`] keeps
//! `api_keys` and `api_usage` in one SQLite file, separate from user memory
//! databases, and opens a fresh handle per call.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use std::path::PathBuf;

use super::rate_limit::Tier;
use super::{generate_key, hash_key};
use crate::db::validate_user_id;

/// Usage rows older than this are pruned whenever a request is recorded.
const USAGE_RETENTION_MINS: i64 = 60;

/// A stored API key. The plaintext key is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiKeyRecord {
    pub id: String,
    pub user_id: String,
    pub tier: Tier,
    pub name: Option<String>,
    pub created_at: String,
    pub last_used_at: Option<String>,
    pub revoked: bool,
}

/// Input to [`KeyStore::create_key`].
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub user_id: String,
    pub tier: Tier,
    pub name: Option<String>,
}

/// Outcome of [`KeyStore::check_and_record`]. `used` counts the requests already in
/// the window, not including this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageCheck {
    Recorded { used: u64 },
    OverLimit { used: u64 },
}

/// Key lookup plus usage accounting. All methods block.
pub trait KeyStore: Send + Sync {
    /// Find a key by the hash of its plaintext. Revoked keys are returned with
    /// `revoked = true`; callers must reject them.
    fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>>;

    fn touch_last_used(&self, key_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Count the key's requests at or after `since` and, if fewer than `limit`,
    /// record one at `now`. The count and the insert are atomic with respect to
    /// other callers checking the same key.
    fn check_and_record(
        &self,
        key_id: &str,
        since: DateTime<Utc>,
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<UsageCheck>;

    /// Create a key, returning the record and the plaintext (shown once).
    fn create_key(&self, new: &NewApiKey) -> Result<(ApiKeyRecord, String)>;

    fn list_keys(&self, user_id: &str) -> Result<Vec<ApiKeyRecord>>;

    /// Returns `false` if no such key exists.
    fn revoke_key(&self, key_id: &str) -> Result<bool>;
}

const KEYS_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS api_keys (
    id TEXT PRIMARY KEY,
    key_hash TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    tier TEXT NOT NULL DEFAULT 'free' CHECK(tier IN ('free','pro','enterprise')),
    name TEXT,
    created_at TEXT NOT NULL,
    last_used_at TEXT,
    revoked INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_api_keys_user ON api_keys(user_id);

CREATE TABLE IF NOT EXISTS api_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key_id TEXT NOT NULL,
    requested_at_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_api_usage_key_time ON api_usage(key_id, requested_at_ms);
"#;

#[derive(Debug, Clone)]
pub struct SqliteKeyStore {
    path: PathBuf,
}

impl SqliteKeyStore {
    /// Create the key database (and its parent directory) if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into() };
        if let Some(parent) = store.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let conn = store.connect()?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("failed to open key store at {}", self.path.display()))?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;
        conn.execute_batch(KEYS_SCHEMA_SQL)
            .context("failed to initialize key store schema")?;
        Ok(conn)
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApiKeyRecord> {
    let tier_str: String = row.get(2)?;
    let tier: Tier = tier_str.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(ApiKeyRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        tier,
        name: row.get(3)?,
        created_at: row.get(4)?,
        last_used_at: row.get(5)?,
        revoked: row.get(6)?,
    })
}

const KEY_COLUMNS: &str = "id, user_id, tier, name, created_at, last_used_at, revoked";

impl KeyStore for SqliteKeyStore {
    fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                &format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE key_hash = ?1"),
                params![key_hash],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn touch_last_used(&self, key_id: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE api_keys SET last_used_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true), key_id],
        )?;
        Ok(())
    }

    fn check_and_record(
        &self,
        key_id: &str,
        since: DateTime<Utc>,
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<UsageCheck> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let used: i64 = tx.query_row(
            "SELECT COUNT(*) FROM api_usage WHERE key_id = ?1 AND requested_at_ms >= ?2",
            params![key_id, since.timestamp_millis()],
            |row| row.get(0),
        )?;
        let used = used as u64;
        if used >= limit {
            return Ok(UsageCheck::OverLimit { used });
        }

        tx.execute(
            "INSERT INTO api_usage (key_id, requested_at_ms) VALUES (?1, ?2)",
            params![key_id, now.timestamp_millis()],
        )?;
        let cutoff = (now - Duration::minutes(USAGE_RETENTION_MINS)).timestamp_millis();
        tx.execute(
            "DELETE FROM api_usage WHERE key_id = ?1 AND requested_at_ms < ?2",
            params![key_id, cutoff],
        )?;
        tx.commit()?;
        Ok(UsageCheck::Recorded { used })
    }

    fn create_key(&self, new: &NewApiKey) -> Result<(ApiKeyRecord, String)> {
        validate_user_id(&new.user_id)?;
        let plaintext = generate_key();
        let record = ApiKeyRecord {
            id: uuid::Uuid::now_v7().to_string(),
            user_id: new.user_id.clone(),
            tier: new.tier,
            name: new.name.clone(),
            created_at: crate::memory::now_timestamp(),
            last_used_at: None,
            revoked: false,
        };

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO api_keys (id, key_hash, user_id, tier, name, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                hash_key(&plaintext),
                record.user_id,
                record.tier.as_str(),
                record.name,
                record.created_at,
            ],
        )?;

        tracing::info!(key_id = %record.id, user_id = %record.user_id, tier = %record.tier, "api key created");
        Ok((record, plaintext))
    }

    fn list_keys(&self, user_id: &str) -> Result<Vec<ApiKeyRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {KEY_COLUMNS} FROM api_keys WHERE user_id = ?1 ORDER BY created_at"
        ))?;
        let records = stmt
            .query_map(params![user_id], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn revoke_key(&self, key_id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let rows = conn.execute(
            "UPDATE api_keys SET revoked = 1 WHERE id = ?1",
            params![key_id],
        )?;
        if rows > 0 {
            tracing::info!(key_id, "api key revoked");
        }
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, SqliteKeyStore) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteKeyStore::open(tmp.path().join("keys.db")).unwrap();
        (tmp, store)
    }

    fn new_key(user: &str, tier: Tier) -> NewApiKey {
        NewApiKey {
            user_id: user.into(),
            tier,
            name: Some("laptop".into()),
        }
    }

    #[test]
    fn created_key_is_found_by_hash_only() {
        let (_tmp, store) = test_store();
        let (record, plaintext) = store.create_key(&new_key("alice", Tier::Pro)).unwrap();

        let found = store.find_by_hash(&hash_key(&plaintext)).unwrap().unwrap();
        assert_eq!(found, record);
        assert!(store.find_by_hash(&plaintext).unwrap().is_none());
        assert!(store.find_by_hash(&hash_key("mv_wrong")).unwrap().is_none());
    }

    #[test]
    fn create_rejects_unsafe_user_id() {
        let (_tmp, store) = test_store();
        assert!(store.create_key(&new_key("../root", Tier::Free)).is_err());
    }

    #[test]
    fn usage_counts_within_window() {
        let (_tmp, store) = test_store();
        let now = Utc::now();
        let since = now - Duration::seconds(60);
        for at in [now - Duration::seconds(90), now - Duration::seconds(10)] {
            store.check_and_record("k1", at - Duration::seconds(60), 100, at).unwrap();
        }
        store.check_and_record("k2", since, 100, now).unwrap();

        assert_eq!(
            store.check_and_record("k1", since, 100, now).unwrap(),
            UsageCheck::Recorded { used: 1 }
        );
        assert_eq!(
            store.check_and_record("k1", since, 2, now).unwrap(),
            UsageCheck::OverLimit { used: 2 }
        );
        assert_eq!(
            store.check_and_record("k2", since, 2, now).unwrap(),
            UsageCheck::Recorded { used: 1 }
        );
    }

    #[test]
    fn over_limit_is_not_recorded() {
        let (_tmp, store) = test_store();
        let now = Utc::now();
        let since = now - Duration::seconds(60);
        store.check_and_record("k1", since, 1, now).unwrap();
        for _ in 0..3 {
            assert_eq!(
                store.check_and_record("k1", since, 1, now).unwrap(),
                UsageCheck::OverLimit { used: 1 }
            );
        }
    }

    #[test]
    fn old_usage_is_pruned() {
        let (_tmp, store) = test_store();
        let now = Utc::now();
        let long_ago = now - Duration::hours(3);
        store.check_and_record("k1", long_ago, 100, long_ago).unwrap();
        store.check_and_record("k1", now, 100, now).unwrap();

        assert_eq!(
            store.check_and_record("k1", now - Duration::days(1), 100, now).unwrap(),
            UsageCheck::Recorded { used: 1 }
        );
    }

    #[test]
    fn concurrent_checks_never_exceed_limit() {
        let (_tmp, store) = test_store();
        let now = Utc::now();
        let since = now - Duration::seconds(60);
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    store.check_and_record("k1", since, 5, now).unwrap()
                })
            })
            .collect();
        let recorded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|check| matches!(check, UsageCheck::Recorded { .. }))
            .count();

        assert_eq!(recorded, 5);
    }

    #[test]
    fn revoke_and_list() {
        let (_tmp, store) = test_store();
        let (record, plaintext) = store.create_key(&new_key("bob", Tier::Free)).unwrap();
        store.create_key(&new_key("bob", Tier::Enterprise)).unwrap();

        assert_eq!(store.list_keys("bob").unwrap().len(), 2);
        assert!(store.revoke_key(&record.id).unwrap());
        assert!(!store.revoke_key("missing").unwrap());

        let found = store.find_by_hash(&hash_key(&plaintext)).unwrap().unwrap();
        assert!(found.revoked);
    }

    #[test]
    fn touch_sets_last_used() {
        let (_tmp, store) = test_store();
        let (record, plaintext) = store.create_key(&new_key("carol", Tier::Free)).unwrap();
        store.touch_last_used(&record.id, Utc::now()).unwrap();

        let found = store.find_by_hash(&hash_key(&plaintext)).unwrap().unwrap();
        assert!(found.last_used_at.is_some());
    }
}
