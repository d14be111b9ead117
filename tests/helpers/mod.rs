#![allow(dead_code)]

use memvault::db;
use memvault::memory::types::{MemoryType, NewMemory};
use rusqlite::Connection;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

/// Insert a test memory via the store module. Returns the memory ID.
pub fn insert_memory(
    conn: &mut Connection,
    content: &str,
    memory_type: MemoryType,
    importance: f64,
) -> String {
    let memory = NewMemory::new(content)
        .with_type(memory_type)
        .with_importance(importance);
    memvault::memory::store::store_memory(conn, &memory)
        .unwrap()
        .id
}

/// Force a memory's activation, bypassing recall and consolidation.
pub fn set_activation(conn: &Connection, id: &str, activation: f64) {
    conn.execute(
        "UPDATE memories SET activation = ?1 WHERE id = ?2",
        rusqlite::params![activation, id],
    )
    .unwrap();
}

pub fn activation_of(conn: &Connection, id: &str) -> f64 {
    conn.query_row(
        "SELECT activation FROM memories WHERE id = ?1",
        [id],
        |row| row.get(0),
    )
    .unwrap()
}
