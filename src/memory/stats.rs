use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

use super::types::MemoryType;

/// Response from memory_stats.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_memories: u64,
    /// One entry per memory type, zero-filled.
    pub by_type: HashMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_memory: Option<String>,
    /// Mean importance; 0.0 for an empty store.
    pub avg_importance: f64,
}

/// Compute memory store statistics.
pub fn memory_stats(conn: &Connection) -> Result<StatsResponse> {
    let (total, oldest, newest, avg_importance): (i64, Option<String>, Option<String>, Option<f64>) =
        conn.query_row(
            "SELECT COUNT(*), MIN(created_at), MAX(created_at), AVG(importance) FROM memories",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

    Ok(StatsResponse {
        total_memories: total as u64,
        by_type: count_by_type(conn)?,
        oldest_memory: oldest,
        newest_memory: newest,
        avg_importance: avg_importance.unwrap_or(0.0),
    })
}

/// Count by memory type.
fn count_by_type(conn: &Connection) -> Result<HashMap<String, u64>> {
    let mut map: HashMap<String, u64> = MemoryType::ALL
        .iter()
        .map(|t| (t.as_str().to_string(), 0))
        .collect();

    let mut stmt = conn.prepare("SELECT type, COUNT(*) FROM memories GROUP BY type")?;
    let rows: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    for (t, count) in rows {
        map.insert(t, count as u64);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::memory::store;
    use crate::memory::types::NewMemory;

    fn insert(conn: &mut Connection, content: &str, mt: MemoryType, importance: f64) -> String {
        store::store_memory(conn, &NewMemory::new(content).with_type(mt).with_importance(importance))
            .unwrap()
            .id
    }

    #[test]
    fn test_empty_db_stats() {
        let conn = db::open_memory_database().unwrap();
        let stats = memory_stats(&conn).unwrap();
        assert_eq!(stats.total_memories, 0);
        assert_eq!(stats.by_type.len(), 5);
        assert!(stats.by_type.values().all(|&c| c == 0));
        assert!(stats.oldest_memory.is_none());
        assert!(stats.newest_memory.is_none());
        assert_eq!(stats.avg_importance, 0.0);
    }

    #[test]
    fn test_stats_counts_by_type() {
        let mut conn = db::open_memory_database().unwrap();
        insert(&mut conn, "Fact one", MemoryType::Factual, 0.2);
        insert(&mut conn, "Fact two", MemoryType::Factual, 0.4);
        insert(&mut conn, "Event one", MemoryType::Episodic, 0.6);

        let stats = memory_stats(&conn).unwrap();
        assert_eq!(stats.total_memories, 3);
        assert_eq!(stats.by_type["factual"], 2);
        assert_eq!(stats.by_type["episodic"], 1);
        assert_eq!(stats.by_type["semantic"], 0);
        assert_eq!(stats.by_type["relational"], 0);
        assert_eq!(stats.by_type["procedural"], 0);
        assert!((stats.avg_importance - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_stats_timestamps() {
        let mut conn = db::open_memory_database().unwrap();
        insert(&mut conn, "First memory", MemoryType::Factual, 0.5);
        insert(&mut conn, "Second memory", MemoryType::Factual, 0.5);

        let stats = memory_stats(&conn).unwrap();
        let oldest = stats.oldest_memory.unwrap();
        let newest = stats.newest_memory.unwrap();
        assert!(oldest <= newest);
    }
}
