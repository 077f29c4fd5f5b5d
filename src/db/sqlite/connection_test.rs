//! Tests for SQLite database connection and schema bootstrap.

use crate::auth::CredentialHasher;
use crate::config::DatabaseTarget;
use crate::db::sqlite::{DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_ID, DEFAULT_ADMIN_USERNAME};
use crate::db::{Database, SqliteDatabase, UserRepository};

async fn table_names(db: &SqliteDatabase) -> Vec<String> {
    let mut conn = db.connect().await.expect("Connect should succeed");
    sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
        .fetch_all(&mut conn)
        .await
        .expect("Query should succeed")
}

#[tokio::test(flavor = "multi_thread")]
async fn ensure_schema_creates_all_tables() {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");

    db.ensure_schema().await.expect("Schema should initialize");

    let tables = table_names(&db).await;
    for table in ["users", "projects", "todos", "recurring_todos"] {
        assert!(
            tables.iter().any(|t| t == table),
            "Missing table: {}. Found tables: {:?}",
            table,
            tables
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn ensure_schema_creates_indexes() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    db.ensure_schema().await.unwrap();

    let mut conn = db.connect().await.unwrap();
    let indexes: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .fetch_all(&mut conn)
            .await
            .unwrap();

    for index in [
        "idx_users_username",
        "idx_projects_user_id",
        "idx_todos_user_id",
        "idx_todos_status",
        "idx_todos_due_date",
    ] {
        assert!(indexes.iter().any(|i| i == index), "Missing index {}", index);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn ensure_schema_creates_default_admin() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    db.ensure_schema().await.unwrap();

    let admin = db
        .users()
        .find_by_id(DEFAULT_ADMIN_ID)
        .await
        .unwrap()
        .expect("Default admin should exist");

    assert_eq!(admin.username, DEFAULT_ADMIN_USERNAME);
    assert_eq!(admin.email, DEFAULT_ADMIN_EMAIL);
    assert_eq!(admin.first_name.as_deref(), Some("Admin"));
    assert_eq!(admin.last_name.as_deref(), Some("User"));
    assert!(admin.active);
    assert!(CredentialHasher::new().verify("admin", &admin.password_hash));
}

#[tokio::test(flavor = "multi_thread")]
async fn ensure_schema_is_idempotent() {
    let db = SqliteDatabase::in_memory().await.unwrap();

    db.ensure_schema().await.expect("First run should succeed");
    db.ensure_schema().await.expect("Second run should succeed");

    assert_eq!(db.users().count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_ensure_schema_initializes_once() {
    let db = SqliteDatabase::in_memory().await.unwrap();

    let (a, b) = tokio::join!(db.ensure_schema(), db.ensure_schema());
    a.unwrap();
    b.unwrap();

    assert_eq!(db.users().count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn two_contexts_on_one_file_share_a_single_admin() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("todos.db");

    let first = SqliteDatabase::open(DatabaseTarget::File(path.clone()))
        .await
        .unwrap();
    first.ensure_schema().await.unwrap();
    drop(first);

    assert!(path.exists(), "Database file should be created");

    let second = SqliteDatabase::open(DatabaseTarget::File(path))
        .await
        .unwrap();
    second.ensure_schema().await.unwrap();

    assert_eq!(second.users().count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn separate_in_memory_contexts_are_isolated() {
    let a = SqliteDatabase::in_memory().await.unwrap();
    let b = SqliteDatabase::in_memory().await.unwrap();
    a.ensure_schema().await.unwrap();

    assert!(table_names(&b).await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn connections_enforce_foreign_keys() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let mut conn = db.connect().await.unwrap();

    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&mut conn)
        .await
        .unwrap();

    assert_eq!(enabled, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn healthy_database_reports_healthy() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    assert!(db.is_healthy().await);
    assert_eq!(db.target(), &DatabaseTarget::InMemory);
}
