mod helpers;

use memvault::db::migrations::{get_schema_version, run_migrations, CURRENT_SCHEMA_VERSION};

fn index_names(conn: &rusqlite::Connection) -> Vec<String> {
    conn.prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn fresh_db_migrates_to_current_version() {
    let conn = helpers::test_db();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn migration_adds_activation_index() {
    let conn = helpers::test_db();
    assert!(index_names(&conn).contains(&"idx_memories_activation".to_string()));
}

#[test]
fn migrations_are_idempotent() {
    let conn = helpers::test_db();
    run_migrations(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn manual_v1_db_upgrades_correctly() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    memvault::db::schema::init_schema(&conn).unwrap();

    assert_eq!(get_schema_version(&conn).unwrap(), 1);
    assert!(!index_names(&conn).contains(&"idx_memories_activation".to_string()));

    run_migrations(&conn).unwrap();

    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    assert!(index_names(&conn).contains(&"idx_memories_activation".to_string()));
}
