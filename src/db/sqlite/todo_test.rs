//! Tests for SqliteTodoRepository.

use chrono::{Days, NaiveDate};

use crate::db::sqlite::DEFAULT_ADMIN_ID;
use crate::db::utils::today;
use crate::db::{
    Database, DbError, NewProject, NewTodo, Priority, ProjectRepository, Recurrence,
    SqliteDatabase, TodoKind, TodoRepository, TodoStatus,
};

async fn setup_db() -> SqliteDatabase {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");
    db.ensure_schema().await.expect("Schema should initialize");
    db
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn extension_rows(db: &SqliteDatabase, todo_id: i64) -> i64 {
    let mut conn = db.connect().await.unwrap();
    sqlx::query_scalar("SELECT COUNT(*) FROM recurring_todos WHERE todo_id = ?")
        .bind(todo_id)
        .fetch_one(&mut conn)
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn create_and_find_simple_todo() {
    let db = setup_db().await;
    let repo = db.todos();

    let mut new = NewTodo::new("Write report", DEFAULT_ADMIN_ID);
    new.description = Some("Quarterly numbers".to_string());
    new.due_date = Some(date(2025, 2, 14));
    new.priority = Priority::High;

    let created = repo.create(&new).await.expect("Create should succeed");
    let found = repo
        .find_by_id(created.id)
        .await
        .unwrap()
        .expect("Todo should exist");

    assert_eq!(found, created);
    assert_eq!(found.kind, TodoKind::Simple);
    assert_eq!(found.project_id, None);
    assert_eq!(extension_rows(&db, created.id).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn create_and_find_recurring_todo() {
    let db = setup_db().await;
    let repo = db.todos();

    let recurrence = Recurrence::new(7).unwrap().with_max_occurrences(3).unwrap();
    let mut new = NewTodo::new("Weekly review", DEFAULT_ADMIN_ID).recurring(recurrence);
    new.due_date = Some(date(2025, 1, 6));

    let created = repo.create(&new).await.unwrap();
    let found = repo.find_by_id(created.id).await.unwrap().unwrap();

    assert_eq!(found, created);
    assert!(found.is_recurring());
    assert_eq!(found.recurrence(), Some(&recurrence));
    assert_eq!(found.next_due_date(), Some(date(2025, 1, 13)));
    assert_eq!(extension_rows(&db, created.id).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn lists_return_both_kinds() {
    let db = setup_db().await;
    let repo = db.todos();
    repo.create(&NewTodo::new("Simple", DEFAULT_ADMIN_ID))
        .await
        .unwrap();
    repo.create(&NewTodo::new("Recurring", DEFAULT_ADMIN_ID).recurring(Recurrence::new(1).unwrap()))
        .await
        .unwrap();

    let all = repo.find_all().await.unwrap();

    assert_eq!(all.len(), 2);
    assert_eq!(all.iter().filter(|t| t.is_recurring()).count(), 1);
    assert_eq!(all[0].title, "Recurring", "Newest first");
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_todo_is_none() {
    let db = setup_db().await;
    assert!(db.todos().find_by_id(404).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn overlong_title_is_rejected() {
    let db = setup_db().await;

    let result = db
        .todos()
        .create(&NewTodo::new("x".repeat(256), DEFAULT_ADMIN_ID))
        .await;

    assert!(matches!(result, Err(DbError::Validation { .. })));
    assert_eq!(db.todos().count().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn update_simple_todo() {
    let db = setup_db().await;
    let repo = db.todos();
    let mut todo = repo
        .create(&NewTodo::new("Draft", DEFAULT_ADMIN_ID))
        .await
        .unwrap();

    todo.title = "Final".to_string();
    todo.status = TodoStatus::InProgress;
    todo.priority = Priority::Urgent;
    let updated = repo.update(&todo).await.expect("Update should succeed");

    let found = repo.find_by_id(todo.id).await.unwrap().unwrap();
    assert_eq!(found, updated);
    assert_eq!(found.created_at, todo.created_at);
}

#[tokio::test(flavor = "multi_thread")]
async fn update_turns_simple_todo_recurring() {
    let db = setup_db().await;
    let repo = db.todos();
    let mut todo = repo
        .create(&NewTodo::new("Water plants", DEFAULT_ADMIN_ID))
        .await
        .unwrap();
    assert_eq!(extension_rows(&db, todo.id).await, 0);

    todo.kind = TodoKind::Recurring(Recurrence::new(3).unwrap());
    todo.due_date = Some(date(2025, 4, 1));
    repo.update(&todo).await.unwrap();

    let found = repo.find_by_id(todo.id).await.unwrap().unwrap();
    assert!(found.is_recurring());
    assert_eq!(found.recurrence().unwrap().interval_days(), 3);
    assert_eq!(extension_rows(&db, todo.id).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn update_turns_recurring_todo_simple() {
    let db = setup_db().await;
    let repo = db.todos();
    let mut todo = repo
        .create(&NewTodo::new("Standup", DEFAULT_ADMIN_ID).recurring(Recurrence::new(1).unwrap()))
        .await
        .unwrap();

    todo.kind = TodoKind::Simple;
    repo.update(&todo).await.unwrap();

    let found = repo.find_by_id(todo.id).await.unwrap().unwrap();
    assert!(!found.is_recurring());
    assert_eq!(extension_rows(&db, todo.id).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn update_missing_todo_is_not_found() {
    let db = setup_db().await;
    let repo = db.todos();
    let mut todo = repo
        .create(&NewTodo::new("Ghost", DEFAULT_ADMIN_ID))
        .await
        .unwrap();
    todo.id = 404;

    let result = repo.update(&todo).await;

    assert!(matches!(result, Err(DbError::TodoNotFound { id: 404 })));
}

#[tokio::test(flavor = "multi_thread")]
async fn completing_recurring_todo_walks_through_occurrences() {
    let db = setup_db().await;
    let repo = db.todos();
    let start = date(2025, 1, 6);

    let recurrence = Recurrence::new(7).unwrap().with_max_occurrences(3).unwrap();
    let mut new = NewTodo::new("Weekly review", DEFAULT_ADMIN_ID).recurring(recurrence);
    new.due_date = Some(start);
    let todo = repo.create(&new).await.unwrap();

    let second = repo.complete(todo.id).await.unwrap();
    assert_eq!(second.status, TodoStatus::Todo);
    assert_eq!(second.due_date, Some(start + Days::new(7)));
    assert_eq!(second.recurrence().unwrap().current_occurrence(), 2);

    let third = repo.complete(todo.id).await.unwrap();
    assert_eq!(third.status, TodoStatus::Todo);
    assert_eq!(third.due_date, Some(start + Days::new(14)));
    assert_eq!(third.recurrence().unwrap().current_occurrence(), 3);

    let last = repo.complete(todo.id).await.unwrap();
    assert_eq!(last.status, TodoStatus::Completed);
    assert_eq!(last.due_date, Some(start + Days::new(14)));
    assert_eq!(last.recurrence().unwrap().current_occurrence(), 3);

    let stored = repo.find_by_id(todo.id).await.unwrap().unwrap();
    assert_eq!(stored, last);
}

#[tokio::test(flavor = "multi_thread")]
async fn completing_completed_todo_changes_nothing() {
    let db = setup_db().await;
    let repo = db.todos();
    let todo = repo
        .create(&NewTodo::new("Once", DEFAULT_ADMIN_ID))
        .await
        .unwrap();

    let completed = repo.complete(todo.id).await.unwrap();
    assert_eq!(completed.status, TodoStatus::Completed);

    let again = repo.complete(todo.id).await.unwrap();
    assert_eq!(again, completed);
}

#[tokio::test(flavor = "multi_thread")]
async fn completing_missing_todo_is_not_found() {
    let db = setup_db().await;

    let result = db.todos().complete(404).await;

    assert!(matches!(result, Err(DbError::TodoNotFound { id: 404 })));
}

#[tokio::test(flavor = "multi_thread")]
async fn overdue_excludes_finished_and_future_todos() {
    let db = setup_db().await;
    let repo = db.todos();
    let yesterday = today() - Days::new(1);

    let mut late = NewTodo::new("Late", DEFAULT_ADMIN_ID);
    late.due_date = Some(yesterday);
    let late = repo.create(&late).await.unwrap();

    let mut done = NewTodo::new("Done late", DEFAULT_ADMIN_ID);
    done.due_date = Some(yesterday);
    done.status = TodoStatus::Completed;
    let done = repo.create(&done).await.unwrap();

    let mut due_today = NewTodo::new("Due today", DEFAULT_ADMIN_ID);
    due_today.due_date = Some(today());
    repo.create(&due_today).await.unwrap();

    repo.create(&NewTodo::new("No date", DEFAULT_ADMIN_ID))
        .await
        .unwrap();

    let overdue = repo.find_overdue().await.unwrap();

    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, late.id);
    assert!(late.is_overdue());
    assert!(!done.is_overdue());
}

#[tokio::test(flavor = "multi_thread")]
async fn due_before_is_inclusive_and_sorted() {
    let db = setup_db().await;
    let repo = db.todos();

    for (title, due) in [
        ("Third", date(2025, 3, 3)),
        ("First", date(2025, 3, 1)),
        ("Later", date(2025, 4, 1)),
        ("Second", date(2025, 3, 2)),
    ] {
        let mut new = NewTodo::new(title, DEFAULT_ADMIN_ID);
        new.due_date = Some(due);
        repo.create(&new).await.unwrap();
    }

    let titles: Vec<String> = repo
        .find_due_before(date(2025, 3, 3))
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();

    assert_eq!(titles, vec!["First", "Second", "Third"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn filter_by_status_priority_project_and_user() {
    let db = setup_db().await;
    let repo = db.todos();
    let project = db
        .projects()
        .create(&NewProject::new("Errands", DEFAULT_ADMIN_ID))
        .await
        .unwrap();

    let mut filed = NewTodo::new("Filed", DEFAULT_ADMIN_ID);
    filed.project_id = Some(project.id);
    filed.priority = Priority::Low;
    repo.create(&filed).await.unwrap();

    let mut loose = NewTodo::new("Loose", DEFAULT_ADMIN_ID);
    loose.status = TodoStatus::InProgress;
    repo.create(&loose).await.unwrap();

    let by_project = repo.find_by_project(project.id).await.unwrap();
    assert_eq!(by_project.len(), 1);
    assert_eq!(by_project[0].title, "Filed");

    let by_priority = repo.find_by_priority(Priority::Low).await.unwrap();
    assert_eq!(by_priority.len(), 1);

    let in_progress = repo.find_by_status(TodoStatus::InProgress).await.unwrap();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].title, "Loose");

    assert_eq!(repo.find_by_user(DEFAULT_ADMIN_ID).await.unwrap().len(), 2);
    assert_eq!(repo.count().await.unwrap(), 2);
    assert_eq!(repo.count_by_status(TodoStatus::Todo).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_recurring_todo_removes_extension_row() {
    let db = setup_db().await;
    let repo = db.todos();
    let todo = repo
        .create(&NewTodo::new("Gone", DEFAULT_ADMIN_ID).recurring(Recurrence::new(2).unwrap()))
        .await
        .unwrap();

    assert!(repo.delete(todo.id).await.unwrap());
    assert_eq!(extension_rows(&db, todo.id).await, 0);
    assert!(repo.find_by_id(todo.id).await.unwrap().is_none());
    assert!(!repo.delete(todo.id).await.unwrap());
}
