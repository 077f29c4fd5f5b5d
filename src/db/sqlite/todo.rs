//! SQLite TodoRepository implementation.
//!
//! A recurring todo is a `todos` row plus a `recurring_todos` row keyed by
//! the same id. Writes touching both run in one transaction; reads always
//! left-join the extension table.

use chrono::NaiveDate;
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info, instrument};

use super::SqliteDatabase;
use super::helpers::{db_error, last_insert_id, to_count};
use super::mapper::{RecurrenceRow, TODO_SELECT, recurrence_row, row_to_todo};
use crate::db::utils::{now, today};
use crate::db::{
    DbError, DbResult, Id, NewTodo, Priority, Todo, TodoRepository, TodoStatus,
};

/// SQLx-backed todo repository.
pub struct SqliteTodoRepository<'a> {
    pub(crate) db: &'a SqliteDatabase,
}

impl<'a> SqliteTodoRepository<'a> {
    async fn fetch_by_id(conn: &mut SqliteConnection, id: Id) -> DbResult<Option<Todo>> {
        let sql = format!("{} WHERE t.id = ?", TODO_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error("failed to find todo"))?;

        row.as_ref().map(row_to_todo).transpose()
    }

    async fn list(&self, filter: &str, order: &str, bind: Option<Bind<'_>>) -> DbResult<Vec<Todo>> {
        let mut conn = self.db.connect().await?;
        let sql = format!("{} {} ORDER BY {}", TODO_SELECT, filter, order);
        let query = sqlx::query(&sql);
        let query = match bind {
            Some(Bind::Id(id)) => query.bind(id),
            Some(Bind::Text(text)) => query.bind(text),
            Some(Bind::Date(date)) => query.bind(date),
            None => query,
        };
        let rows = query
            .fetch_all(&mut conn)
            .await
            .map_err(db_error("failed to list todos"))?;

        rows.iter().map(row_to_todo).collect()
    }

    /// Write the base row of an existing todo. Returns rows affected.
    async fn write_base(
        conn: &mut SqliteConnection,
        todo: &Todo,
        updated_at: chrono::NaiveDateTime,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE todos
            SET title = ?, description = ?, due_date = ?, priority = ?, status = ?,
                project_id = ?, user_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.due_date)
        .bind(todo.priority.as_str())
        .bind(todo.status.as_str())
        .bind(todo.project_id)
        .bind(todo.user_id)
        .bind(updated_at)
        .bind(todo.id)
        .execute(&mut *conn)
        .await
        .map_err(db_error("failed to update todo"))?;

        Ok(result.rows_affected())
    }

    /// Bring the extension row in line with the todo's kind: update it,
    /// insert it if the update touched nothing, or delete it for simple
    /// todos.
    async fn write_extension(
        conn: &mut SqliteConnection,
        id: Id,
        extension: Option<RecurrenceRow>,
    ) -> DbResult<()> {
        let Some(row) = extension else {
            sqlx::query("DELETE FROM recurring_todos WHERE todo_id = ?")
                .bind(id)
                .execute(&mut *conn)
                .await
                .map_err(db_error("failed to remove recurrence"))?;
            return Ok(());
        };

        let updated = sqlx::query(
            r#"
            UPDATE recurring_todos
            SET recurring_interval_days = ?, max_occurrences = ?, current_occurrence = ?,
                next_due_date = ?
            WHERE todo_id = ?
            "#,
        )
        .bind(row.interval_days)
        .bind(row.max_occurrences)
        .bind(row.current_occurrence)
        .bind(row.next_due_date)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_error("failed to update recurrence"))?;

        if updated.rows_affected() == 0 {
            insert_extension(conn, id, &row).await?;
        }
        Ok(())
    }

    /// Write base and extension rows of an existing todo and return it with
    /// a fresh `updated_at`.
    async fn write(conn: &mut SqliteConnection, todo: &Todo) -> DbResult<Todo> {
        let updated_at = now();
        if Self::write_base(&mut *conn, todo, updated_at).await? == 0 {
            return Err(DbError::TodoNotFound { id: todo.id });
        }
        Self::write_extension(&mut *conn, todo.id, recurrence_row(&todo.kind, todo.due_date))
            .await?;

        Ok(Todo {
            updated_at,
            ..todo.clone()
        })
    }

    /// Persist `todo` in one transaction.
    async fn persist(&self, todo: &Todo) -> DbResult<Todo> {
        let mut conn = self.db.connect().await?;
        let mut tx = conn
            .begin()
            .await
            .map_err(db_error("failed to begin transaction"))?;

        let todo = Self::write(&mut *tx, todo).await?;

        tx.commit()
            .await
            .map_err(db_error("failed to commit todo update"))?;

        Ok(todo)
    }
}

enum Bind<'q> {
    Id(Id),
    Text(&'q str),
    Date(NaiveDate),
}

async fn insert_extension(conn: &mut SqliteConnection, id: Id, row: &RecurrenceRow) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO recurring_todos
            (todo_id, recurring_interval_days, max_occurrences, current_occurrence, next_due_date)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(row.interval_days)
    .bind(row.max_occurrences)
    .bind(row.current_occurrence)
    .bind(row.next_due_date)
    .execute(&mut *conn)
    .await
    .map_err(db_error("failed to create recurrence"))?;
    Ok(())
}

const NEWEST_FIRST: &str = "t.created_at DESC, t.id DESC";
const EARLIEST_DUE: &str = "t.due_date ASC, t.id ASC";

impl<'a> TodoRepository for SqliteTodoRepository<'a> {
    #[instrument(skip_all, fields(user_id = todo.user_id))]
    async fn create(&self, todo: &NewTodo) -> DbResult<Todo> {
        todo.validate()?;

        let created_at = now();
        let mut conn = self.db.connect().await?;
        let mut tx = conn
            .begin()
            .await
            .map_err(db_error("failed to begin transaction"))?;

        sqlx::query(
            r#"
            INSERT INTO todos
                (title, description, due_date, priority, status, project_id, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.due_date)
        .bind(todo.priority.as_str())
        .bind(todo.status.as_str())
        .bind(todo.project_id)
        .bind(todo.user_id)
        .bind(created_at)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("failed to create todo"))?;

        let id = last_insert_id(&mut *tx).await?;

        if let Some(row) = recurrence_row(&todo.kind, todo.due_date) {
            insert_extension(&mut *tx, id, &row).await?;
        }

        tx.commit()
            .await
            .map_err(db_error("failed to commit todo creation"))?;

        debug!(todo_id = id, "Todo created");

        Ok(Todo {
            id,
            title: todo.title.clone(),
            description: todo.description.clone(),
            due_date: todo.due_date,
            priority: todo.priority,
            status: todo.status,
            project_id: todo.project_id,
            user_id: todo.user_id,
            kind: todo.kind,
            created_at,
            updated_at: created_at,
        })
    }

    async fn find_by_id(&self, id: Id) -> DbResult<Option<Todo>> {
        let mut conn = self.db.connect().await?;
        Self::fetch_by_id(&mut conn, id).await
    }

    async fn find_all(&self) -> DbResult<Vec<Todo>> {
        self.list("", NEWEST_FIRST, None).await
    }

    async fn find_by_project(&self, project_id: Id) -> DbResult<Vec<Todo>> {
        self.list("WHERE t.project_id = ?", NEWEST_FIRST, Some(Bind::Id(project_id)))
            .await
    }

    async fn find_by_user(&self, user_id: Id) -> DbResult<Vec<Todo>> {
        self.list("WHERE t.user_id = ?", NEWEST_FIRST, Some(Bind::Id(user_id)))
            .await
    }

    async fn find_by_status(&self, status: TodoStatus) -> DbResult<Vec<Todo>> {
        self.list(
            "WHERE t.status = ?",
            NEWEST_FIRST,
            Some(Bind::Text(status.as_str())),
        )
        .await
    }

    async fn find_by_priority(&self, priority: Priority) -> DbResult<Vec<Todo>> {
        self.list(
            "WHERE t.priority = ?",
            NEWEST_FIRST,
            Some(Bind::Text(priority.as_str())),
        )
        .await
    }

    async fn find_due_before(&self, date: NaiveDate) -> DbResult<Vec<Todo>> {
        self.list(
            "WHERE t.due_date IS NOT NULL AND t.due_date <= ?",
            EARLIEST_DUE,
            Some(Bind::Date(date)),
        )
        .await
    }

    async fn find_overdue(&self) -> DbResult<Vec<Todo>> {
        self.list(
            "WHERE t.due_date IS NOT NULL AND t.due_date < ? \
             AND t.status NOT IN ('COMPLETED', 'CANCELLED')",
            EARLIEST_DUE,
            Some(Bind::Date(today())),
        )
        .await
    }

    #[instrument(skip_all, fields(todo_id = todo.id))]
    async fn update(&self, todo: &Todo) -> DbResult<Todo> {
        todo.validate()?;
        let updated = self.persist(todo).await?;
        debug!("Todo updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn complete(&self, id: Id) -> DbResult<Todo> {
        let mut conn = self.db.connect().await?;
        // Read and write under the write lock so concurrent completions
        // each advance from the other's result.
        let mut tx = conn
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(db_error("failed to begin transaction"))?;

        let mut todo = Self::fetch_by_id(&mut *tx, id)
            .await?
            .ok_or(DbError::TodoNotFound { id })?;

        if todo.status == TodoStatus::Completed {
            debug!("Todo already completed");
            return Ok(todo);
        }

        let advanced = todo.mark_completed();
        let todo = Self::write(&mut *tx, &todo).await?;

        tx.commit()
            .await
            .map_err(db_error("failed to commit todo completion"))?;

        match todo.recurrence() {
            Some(recurrence) if advanced => info!(
                occurrence = recurrence.current_occurrence(),
                due_date = ?todo.due_date,
                "Recurring todo advanced to next occurrence"
            ),
            _ => info!("Todo completed"),
        }
        Ok(todo)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Id) -> DbResult<bool> {
        let mut conn = self.db.connect().await?;
        let mut tx = conn
            .begin()
            .await
            .map_err(db_error("failed to begin transaction"))?;

        sqlx::query("DELETE FROM recurring_todos WHERE todo_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("failed to delete recurrence"))?;

        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("failed to delete todo"))?;

        tx.commit()
            .await
            .map_err(db_error("failed to commit todo deletion"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> DbResult<u64> {
        let mut conn = self.db.connect().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM todos")
            .fetch_one(&mut conn)
            .await
            .map_err(db_error("failed to count todos"))?;
        Ok(to_count(count))
    }

    async fn count_by_status(&self, status: TodoStatus) -> DbResult<u64> {
        let mut conn = self.db.connect().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM todos WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&mut conn)
            .await
            .map_err(db_error("failed to count todos by status"))?;
        Ok(to_count(count))
    }
}
