//! Critical integration tests for cascading deletes and atomicity.

use chrono::{Days, NaiveDate};

use crate::config::DatabaseTarget;
use crate::db::sqlite::DEFAULT_ADMIN_ID;
use crate::db::{
    Database, NewProject, NewTodo, NewUser, Project, ProjectRepository, Recurrence, SqliteDatabase,
    TodoRepository, UserRepository,
};

async fn setup_db() -> SqliteDatabase {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");
    db.ensure_schema().await.expect("Schema should initialize");
    db
}

async fn table_count(db: &SqliteDatabase, table: &str) -> i64 {
    let mut conn = db.connect().await.unwrap();
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(&mut conn)
        .await
        .unwrap()
}

/// A project with `simple` plain todos and `recurring` recurring ones.
async fn project_with_todos(
    db: &SqliteDatabase,
    user_id: i64,
    simple: usize,
    recurring: usize,
) -> Project {
    let project = db
        .projects()
        .create(&NewProject::new("Cascade", user_id))
        .await
        .unwrap();

    for i in 0..simple {
        let mut todo = NewTodo::new(format!("Simple {}", i), user_id);
        todo.project_id = Some(project.id);
        db.todos().create(&todo).await.unwrap();
    }
    for i in 0..recurring {
        let mut todo = NewTodo::new(format!("Recurring {}", i), user_id)
            .recurring(Recurrence::new(7).unwrap());
        todo.project_id = Some(project.id);
        db.todos().create(&todo).await.unwrap();
    }

    project
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_project_removes_todos_and_recurrence_rows() {
    let db = setup_db().await;
    let project = project_with_todos(&db, DEFAULT_ADMIN_ID, 2, 1).await;
    let unrelated = db
        .todos()
        .create(&NewTodo::new("Unfiled", DEFAULT_ADMIN_ID))
        .await
        .unwrap();

    assert!(db.projects().delete(project.id).await.unwrap());

    assert_eq!(table_count(&db, "projects").await, 0);
    assert_eq!(table_count(&db, "todos").await, 1);
    assert_eq!(table_count(&db, "recurring_todos").await, 0);
    assert!(db.todos().find_by_id(unrelated.id).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_project_delete_rolls_back_everything() {
    let db = setup_db().await;
    let project = project_with_todos(&db, DEFAULT_ADMIN_ID, 2, 1).await;

    let mut conn = db.connect().await.unwrap();
    sqlx::query(
        "CREATE TRIGGER block_project_delete BEFORE DELETE ON projects \
         BEGIN SELECT RAISE(ABORT, 'simulated failure'); END",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    drop(conn);

    let result = db.projects().delete(project.id).await;
    assert!(result.is_err(), "Delete should fail on the final statement");

    assert_eq!(table_count(&db, "projects").await, 1);
    assert_eq!(table_count(&db, "todos").await, 3);
    assert_eq!(table_count(&db, "recurring_todos").await, 1);
    assert_eq!(db.todos().find_by_project(project.id).await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_user_removes_owned_data_only() {
    let db = setup_db().await;
    let user = db
        .users()
        .create(&NewUser::new("carol", "carol@example.com", "hash"))
        .await
        .unwrap();
    project_with_todos(&db, user.id, 1, 1).await;
    db.todos()
        .create(&NewTodo::new("Loose", user.id))
        .await
        .unwrap();
    project_with_todos(&db, DEFAULT_ADMIN_ID, 1, 0).await;

    assert!(db.users().delete(user.id).await.unwrap());

    assert!(db.todos().find_by_user(user.id).await.unwrap().is_empty());
    assert!(db.projects().find_by_user(user.id).await.unwrap().is_empty());
    assert_eq!(table_count(&db, "recurring_todos").await, 0);
    assert_eq!(db.todos().find_by_user(DEFAULT_ADMIN_ID).await.unwrap().len(), 1);
    assert_eq!(db.projects().count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn todo_for_unknown_project_is_rejected_without_partial_rows() {
    let db = setup_db().await;
    let mut todo = NewTodo::new("Misfiled", DEFAULT_ADMIN_ID).recurring(Recurrence::new(1).unwrap());
    todo.project_id = Some(999);

    assert!(db.todos().create(&todo).await.is_err());

    assert_eq!(table_count(&db, "todos").await, 0);
    assert_eq!(table_count(&db, "recurring_todos").await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_completions_each_advance_recurrence() {
    let dir = tempfile::tempdir().unwrap();
    let db = SqliteDatabase::open(DatabaseTarget::File(dir.path().join("todos.db")))
        .await
        .unwrap();
    db.ensure_schema().await.unwrap();

    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let mut new = NewTodo::new("Daily", DEFAULT_ADMIN_ID).recurring(Recurrence::new(1).unwrap());
    new.due_date = Some(start);
    let todo = db.todos().create(&new).await.unwrap();

    for _ in 0..10 {
        let (first, second) = (db.todos(), db.todos());
        let (a, b) = tokio::join!(first.complete(todo.id), second.complete(todo.id));
        a.expect("First completion should succeed");
        b.expect("Second completion should succeed");
    }

    let stored = db.todos().find_by_id(todo.id).await.unwrap().unwrap();
    assert_eq!(stored.recurrence().unwrap().current_occurrence(), 21);
    assert_eq!(stored.due_date, Some(start + Days::new(20)));
}
