//! SQLite ProjectRepository implementation.

use sqlx::Connection;
use tracing::{debug, info, instrument};

use super::SqliteDatabase;
use super::helpers::{db_error, escape_like, last_insert_id, to_count};
use super::mapper::{PROJECT_COLUMNS, row_to_project};
use crate::db::utils::now;
use crate::db::{DbError, DbResult, Id, NewProject, Project, ProjectRepository};

/// SQLx-backed project repository.
pub struct SqliteProjectRepository<'a> {
    pub(crate) db: &'a SqliteDatabase,
}

impl<'a> SqliteProjectRepository<'a> {
    async fn list(&self, sql: &str, context: &str) -> DbResult<Vec<Project>> {
        let mut conn = self.db.connect().await?;
        let rows = sqlx::query(sql)
            .fetch_all(&mut conn)
            .await
            .map_err(db_error(context))?;

        rows.iter().map(row_to_project).collect()
    }
}

impl<'a> ProjectRepository for SqliteProjectRepository<'a> {
    #[instrument(skip_all, fields(user_id = project.user_id))]
    async fn create(&self, project: &NewProject) -> DbResult<Project> {
        project.validate()?;

        let created_at = now();
        let mut conn = self.db.connect().await?;
        let mut tx = conn
            .begin()
            .await
            .map_err(db_error("failed to begin transaction"))?;

        sqlx::query(
            r#"
            INSERT INTO projects (name, description, start_date, end_date, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.start_date)
        .bind(project.end_date)
        .bind(project.user_id)
        .bind(created_at)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("failed to create project"))?;

        let id = last_insert_id(&mut *tx).await?;
        tx.commit()
            .await
            .map_err(db_error("failed to commit project creation"))?;

        debug!(project_id = id, "Project created");

        Ok(Project {
            id,
            name: project.name.clone(),
            description: project.description.clone(),
            start_date: project.start_date,
            end_date: project.end_date,
            user_id: project.user_id,
            created_at,
            updated_at: created_at,
        })
    }

    async fn find_by_id(&self, id: Id) -> DbResult<Option<Project>> {
        let mut conn = self.db.connect().await?;
        let sql = format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut conn)
            .await
            .map_err(db_error("failed to find project"))?;

        row.as_ref().map(row_to_project).transpose()
    }

    async fn find_all(&self) -> DbResult<Vec<Project>> {
        let sql = format!(
            "SELECT {} FROM projects ORDER BY created_at DESC, id DESC",
            PROJECT_COLUMNS
        );
        self.list(&sql, "failed to list projects").await
    }

    async fn find_by_user(&self, user_id: Id) -> DbResult<Vec<Project>> {
        let mut conn = self.db.connect().await?;
        let sql = format!(
            "SELECT {} FROM projects WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            PROJECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&mut conn)
            .await
            .map_err(db_error("failed to list projects by user"))?;

        rows.iter().map(row_to_project).collect()
    }

    async fn find_by_name(&self, name: &str) -> DbResult<Vec<Project>> {
        let mut conn = self.db.connect().await?;
        let sql = format!(
            "SELECT {} FROM projects WHERE LOWER(name) LIKE LOWER(?) ESCAPE '\\' ORDER BY name",
            PROJECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(format!("%{}%", escape_like(name.trim())))
            .fetch_all(&mut conn)
            .await
            .map_err(db_error("failed to search projects by name"))?;

        rows.iter().map(row_to_project).collect()
    }

    async fn find_active(&self) -> DbResult<Vec<Project>> {
        let sql = format!(
            r#"
            SELECT {} FROM projects p
            WHERE EXISTS (
                SELECT 1 FROM todos t
                WHERE t.project_id = p.id AND t.status NOT IN ('COMPLETED', 'CANCELLED')
            )
            ORDER BY p.created_at DESC, p.id DESC
            "#,
            PROJECT_COLUMNS
        );
        self.list(&sql, "failed to list active projects").await
    }

    async fn find_completed(&self) -> DbResult<Vec<Project>> {
        let sql = format!(
            r#"
            SELECT {} FROM projects p
            WHERE EXISTS (SELECT 1 FROM todos t WHERE t.project_id = p.id)
              AND NOT EXISTS (
                SELECT 1 FROM todos t
                WHERE t.project_id = p.id AND t.status NOT IN ('COMPLETED', 'CANCELLED')
              )
            ORDER BY p.created_at DESC, p.id DESC
            "#,
            PROJECT_COLUMNS
        );
        self.list(&sql, "failed to list completed projects").await
    }

    #[instrument(skip_all, fields(project_id = project.id))]
    async fn update(&self, project: &Project) -> DbResult<Project> {
        project.validate()?;

        let updated_at = now();
        let mut conn = self.db.connect().await?;
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET name = ?, description = ?, start_date = ?, end_date = ?, user_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.start_date)
        .bind(project.end_date)
        .bind(project.user_id)
        .bind(updated_at)
        .bind(project.id)
        .execute(&mut conn)
        .await
        .map_err(db_error("failed to update project"))?;

        if result.rows_affected() == 0 {
            return Err(DbError::ProjectNotFound { id: project.id });
        }

        Ok(Project {
            updated_at,
            ..project.clone()
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Id) -> DbResult<bool> {
        let mut conn = self.db.connect().await?;
        let mut tx = conn
            .begin()
            .await
            .map_err(db_error("failed to begin transaction"))?;

        sqlx::query(
            "DELETE FROM recurring_todos WHERE todo_id IN (SELECT id FROM todos WHERE project_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("failed to delete project's recurring todos"))?;

        let todos = sqlx::query("DELETE FROM todos WHERE project_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("failed to delete project's todos"))?;

        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("failed to delete project"))?;

        tx.commit()
            .await
            .map_err(db_error("failed to commit project deletion"))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(todos = todos.rows_affected(), "Project deleted");
        }
        Ok(deleted)
    }

    async fn count(&self) -> DbResult<u64> {
        let mut conn = self.db.connect().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
            .fetch_one(&mut conn)
            .await
            .map_err(db_error("failed to count projects"))?;
        Ok(to_count(count))
    }

    async fn exists(&self, id: Id) -> DbResult<bool> {
        let mut conn = self.db.connect().await?;
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?)")
                .bind(id)
                .fetch_one(&mut conn)
                .await
                .map_err(db_error("failed to check project"))?;
        Ok(exists)
    }
}
