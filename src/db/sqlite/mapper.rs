//! Row to entity conversion.
//!
//! Decoding failures surface as [`DbError::InvalidData`] naming the
//! column, instead of panicking the way `Row::get` would.

use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, Type};

use crate::db::{
    DbError, DbResult, Priority, Project, Recurrence, Todo, TodoKind, TodoStatus, User,
};

pub(crate) const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
     active, created_at, updated_at, last_login_at";

pub(crate) const PROJECT_COLUMNS: &str =
    "id, name, description, start_date, end_date, user_id, created_at, updated_at";

/// Todo columns plus the optional recurrence extension.
///
/// `rt.recurring_interval_days` is non-null exactly when the todo has a
/// `recurring_todos` row.
pub(crate) const TODO_SELECT: &str = r#"
    SELECT t.id, t.title, t.description, t.due_date, t.priority, t.status,
           t.project_id, t.user_id, t.created_at, t.updated_at,
           rt.recurring_interval_days, rt.max_occurrences,
           rt.current_occurrence, rt.next_due_date
    FROM todos t
    LEFT JOIN recurring_todos rt ON rt.todo_id = t.id
"#;

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> DbResult<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name).map_err(|e| DbError::InvalidData {
        message: format!("cannot decode column {}: {}", name, e),
        help: "The row was written by an incompatible version or edited by hand".to_string(),
    })
}

fn unsigned(row: &SqliteRow, name: &str) -> DbResult<u32> {
    let value: i64 = column(row, name)?;
    u32::try_from(value).map_err(|_| DbError::InvalidData {
        message: format!("column {} holds out-of-range value {}", name, value),
        help: "Recurrence counters must be non-negative 32-bit integers".to_string(),
    })
}

fn parsed<T>(row: &SqliteRow, name: &str) -> DbResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = column(row, name)?;
    raw.parse().map_err(|e: String| DbError::InvalidData {
        message: format!("column {}: {}", name, e),
        help: "Valid values are listed in the column's enum".to_string(),
    })
}

pub(crate) fn row_to_user(row: &SqliteRow) -> DbResult<User> {
    Ok(User {
        id: column(row, "id")?,
        username: column(row, "username")?,
        email: column(row, "email")?,
        password_hash: column(row, "password_hash")?,
        first_name: column(row, "first_name")?,
        last_name: column(row, "last_name")?,
        active: column(row, "active")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
        last_login_at: column(row, "last_login_at")?,
    })
}

pub(crate) fn row_to_project(row: &SqliteRow) -> DbResult<Project> {
    Ok(Project {
        id: column(row, "id")?,
        name: column(row, "name")?,
        description: column(row, "description")?,
        start_date: column(row, "start_date")?,
        end_date: column(row, "end_date")?,
        user_id: column(row, "user_id")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

/// Build a todo from a [`TODO_SELECT`] row. The only place that decides
/// whether a todo is recurring.
pub(crate) fn row_to_todo(row: &SqliteRow) -> DbResult<Todo> {
    let interval: Option<i64> = column(row, "recurring_interval_days")?;
    let kind = match interval {
        None => TodoKind::Simple,
        Some(_) => TodoKind::Recurring(Recurrence::from_storage(
            unsigned(row, "recurring_interval_days")?,
            unsigned(row, "max_occurrences")?,
            unsigned(row, "current_occurrence")?,
        )),
    };

    Ok(Todo {
        id: column(row, "id")?,
        title: column(row, "title")?,
        description: column(row, "description")?,
        due_date: column(row, "due_date")?,
        priority: parsed::<Priority>(row, "priority")?,
        status: parsed::<TodoStatus>(row, "status")?,
        project_id: column(row, "project_id")?,
        user_id: column(row, "user_id")?,
        kind,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

/// Values for the `recurring_todos` row of a todo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecurrenceRow {
    pub interval_days: i64,
    pub max_occurrences: i64,
    pub current_occurrence: i64,
    pub next_due_date: Option<NaiveDate>,
}

/// Extension row for recurring todos, `None` for simple ones.
pub(crate) fn recurrence_row(kind: &TodoKind, due_date: Option<NaiveDate>) -> Option<RecurrenceRow> {
    let recurrence = kind.recurrence()?;
    Some(RecurrenceRow {
        interval_days: i64::from(recurrence.interval_days()),
        max_occurrences: i64::from(recurrence.max_occurrences()),
        current_occurrence: i64::from(recurrence.current_occurrence()),
        next_due_date: due_date.and_then(|due| recurrence.next_due_after(due)),
    })
}
