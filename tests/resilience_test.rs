use memvault::db;
use memvault::memory::search::RecallQuery;
use memvault::memory::service::MemoryService;
use memvault::memory::types::NewMemory;
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("new.db");

    assert!(!db_path.exists());

    let conn = db::open_database(&db_path).unwrap();

    assert!(db_path.exists());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn health_check_passes_on_valid_db() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("health.db")).unwrap();

    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
    assert_eq!(report.schema_version, db::migrations::CURRENT_SCHEMA_VERSION);
    assert!(report.fts_ready);
    assert_eq!(report.memory_count, 0);
    assert_eq!(report.fts_count, 0);
}

#[test]
fn busy_timeout_and_wal_are_set() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("test.db");

    let conn = db::open_database(&db_path).unwrap();

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);

    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .unwrap();
    assert_eq!(mode, "wal");
}

#[test]
fn data_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let id = MemoryService::new(tmp.path())
        .store("alice", &NewMemory::new("persisted across restarts"))
        .unwrap()
        .id;

    let service = MemoryService::new(tmp.path());
    let response = service.recall("alice", &RecallQuery::new("restarts")).unwrap();
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].id, id);
}

#[test]
fn path_traversal_user_ids_never_reach_disk() {
    let tmp = TempDir::new().unwrap();
    let service = MemoryService::new(tmp.path().join("data"));

    for user in ["../escape", "a/b", "", "dot.dot", "space user"] {
        assert!(service.stats(user).is_err(), "{user:?} accepted");
    }
    assert!(!tmp.path().join("escape.db").exists());
    assert!(!tmp.path().join("data").exists());
}

#[test]
fn concurrent_stores_for_one_user_all_land() {
    let tmp = TempDir::new().unwrap();
    let service = MemoryService::new(tmp.path());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = service.clone();
            std::thread::spawn(move || {
                for j in 0..5 {
                    service
                        .store("shared", &NewMemory::new(format!("thread {i} note {j}")))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(service.stats("shared").unwrap().total_memories, 40);
}

#[test]
fn first_opens_of_a_fresh_user_db_do_not_collide() {
    for round in 0..10 {
        let tmp = TempDir::new().unwrap();
        let service = MemoryService::new(tmp.path());
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    service
                        .store("fresh", &NewMemory::new(format!("round {round} thread {i}")))
                        .map(|_| ())
                        .map_err(|e| format!("{e:#}"))
                })
            })
            .collect();
        for handle in handles {
            if let Err(e) = handle.join().unwrap() {
                panic!("round {round}: {e}");
            }
        }

        let conn = db::open_user_database(tmp.path(), "fresh").unwrap();
        let report = db::check_database_health(&conn).unwrap();
        assert_eq!(report.memory_count, 8, "round {round}");
        assert_eq!(report.fts_count, 8, "round {round}");
        assert!(report.fts_ready);
        assert_eq!(report.schema_version, db::migrations::CURRENT_SCHEMA_VERSION);
    }
}
