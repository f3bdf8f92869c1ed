use super::*;

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn saves_and_loads_session_entry() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .save("inscricao-storage", r#"{"version":1}"#)
        .await
        .expect("save");

    let loaded = storage.load("inscricao-storage").await.expect("load");
    assert_eq!(loaded.as_deref(), Some(r#"{"version":1}"#));
    assert_eq!(storage.load("other").await.expect("load"), None);
}

#[tokio::test]
async fn last_write_wins_for_same_key() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.save("k", "first").await.expect("save");
    storage.save("k", "second").await.expect("save");

    let entry = storage
        .load_entry("k")
        .await
        .expect("load")
        .expect("entry exists");
    assert_eq!(entry.value, "second");
    assert!(entry.updated_at <= Utc::now());
}

#[tokio::test]
async fn remove_deletes_entry() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.save("k", "value").await.expect("save");
    storage.remove("k").await.expect("remove");
    assert_eq!(storage.load("k").await.expect("load"), None);

    // removing a missing key is not an error
    storage.remove("k").await.expect("remove again");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("session.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    storage.save("k", "persisted").await.expect("save");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    let reopened = Storage::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened.load("k").await.expect("load").as_deref(),
        Some("persisted")
    );
}

#[tokio::test]
async fn memory_storage_round_trips_entries() {
    let storage = MemorySessionStorage::new();
    assert!(storage.is_empty().await);

    storage.save("a", "1").await.expect("save");
    storage.save("a", "2").await.expect("save");
    assert_eq!(storage.load("a").await.expect("load").as_deref(), Some("2"));
    assert_eq!(storage.len().await, 1);

    storage.remove("a").await.expect("remove");
    assert!(storage.is_empty().await);
}

#[test]
fn sqlite_path_ignores_memory_urls() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(sqlite_path("sqlite://file:memdb?mode=memory"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/session.db?mode=rwc"),
        Some(PathBuf::from("./data/session.db"))
    );
}
