//! Consolidation: uniform activation decay followed by forgetting.
//!
//! Each pass multiplies activation by [`DECAY_FACTOR`] for every memory above
//! [`FORGET_THRESHOLD`], then deletes everything that has fallen below it. The decay
//! is per pass, not per unit of time: how fast memories fade in wall-clock terms
//! depends on how often callers run consolidation.

use anyhow::Result;
use rusqlite::{params, Connection, TransactionBehavior};
use serde::Serialize;

pub const DECAY_FACTOR: f64 = 0.95;
pub const FORGET_THRESHOLD: f64 = 0.01;

/// Counts reported after a consolidation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConsolidationStats {
    pub memories_before: u64,
    pub memories_after: u64,
    /// Always zero; merging near-duplicates is not performed.
    pub merged: u64,
    pub forgotten: u64,
}

/// Decay then forget, in a single IMMEDIATE transaction so a concurrent store
/// cannot land between the two statements.
pub fn consolidate(conn: &mut Connection) -> Result<ConsolidationStats> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let before = count(&tx)?;

    let decayed = tx.execute(
        "UPDATE memories SET activation = activation * ?1 WHERE activation > ?2",
        params![DECAY_FACTOR, FORGET_THRESHOLD],
    )?;
    let forgotten = tx.execute(
        "DELETE FROM memories WHERE activation < ?1",
        params![FORGET_THRESHOLD],
    )? as u64;

    let after = count(&tx)?;
    tx.commit()?;

    tracing::info!(
        before,
        after,
        decayed,
        forgotten,
        "consolidation complete"
    );

    Ok(ConsolidationStats {
        memories_before: before,
        memories_after: after,
        merged: 0,
        forgotten,
    })
}

fn count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
    Ok(n as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::memory::store::store_memory;
    use crate::memory::types::NewMemory;

    fn insert_with_activation(conn: &mut Connection, content: &str, activation: f64) -> String {
        let id = store_memory(conn, &NewMemory::new(content)).unwrap().id;
        conn.execute(
            "UPDATE memories SET activation = ?1 WHERE id = ?2",
            params![activation, id],
        )
        .unwrap();
        id
    }

    fn activation_of(conn: &Connection, id: &str) -> Option<f64> {
        conn.query_row(
            "SELECT activation FROM memories WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .ok()
    }

    #[test]
    fn test_decay_applies_fixed_ratio() {
        let mut conn = db::open_memory_database().unwrap();
        let id = insert_with_activation(&mut conn, "steady", 1.0);

        let stats = consolidate(&mut conn).unwrap();
        assert_eq!(stats.forgotten, 0);
        assert!((activation_of(&conn, &id).unwrap() - 0.95).abs() < 1e-12);

        consolidate(&mut conn).unwrap();
        assert!((activation_of(&conn, &id).unwrap() - 0.9025).abs() < 1e-12);
    }

    #[test]
    fn test_decayed_below_floor_in_same_pass_is_forgotten() {
        let mut conn = db::open_memory_database().unwrap();
        let fading = insert_with_activation(&mut conn, "fading", 0.0105);
        let keep = insert_with_activation(&mut conn, "keep", 0.5);

        let stats = consolidate(&mut conn).unwrap();
        assert_eq!(
            stats,
            ConsolidationStats {
                memories_before: 2,
                memories_after: 1,
                merged: 0,
                forgotten: 1,
            }
        );
        assert!(activation_of(&conn, &fading).is_none());
        assert!(activation_of(&conn, &keep).is_some());
    }

    #[test]
    fn test_exactly_at_floor_is_neither_decayed_nor_forgotten() {
        let mut conn = db::open_memory_database().unwrap();
        let id = insert_with_activation(&mut conn, "edge", FORGET_THRESHOLD);

        let stats = consolidate(&mut conn).unwrap();
        assert_eq!(stats.forgotten, 0);
        assert_eq!(activation_of(&conn, &id), Some(FORGET_THRESHOLD));
    }

    #[test]
    fn test_forgotten_rows_leave_the_index() {
        let mut conn = db::open_memory_database().unwrap();
        insert_with_activation(&mut conn, "ephemeral thought", 0.001);

        consolidate(&mut conn).unwrap();
        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM memories_fts WHERE memories_fts MATCH 'ephemeral'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 0);
    }

    #[test]
    fn test_empty_store() {
        let mut conn = db::open_memory_database().unwrap();
        let stats = consolidate(&mut conn).unwrap();
        assert_eq!(stats.memories_before, 0);
        assert_eq!(stats.memories_after, 0);
        assert_eq!(stats.forgotten, 0);
    }
}
