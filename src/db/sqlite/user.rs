//! SQLite UserRepository implementation.

use sqlx::Connection;
use tracing::{debug, info, instrument};

use super::SqliteDatabase;
use super::helpers::{db_error, last_insert_id, to_count};
use super::mapper::{USER_COLUMNS, row_to_user};
use crate::db::utils::now;
use crate::db::{DbError, DbResult, Id, NewUser, User, UserRepository};

/// SQLx-backed user repository.
pub struct SqliteUserRepository<'a> {
    pub(crate) db: &'a SqliteDatabase,
}

impl<'a> SqliteUserRepository<'a> {
    async fn find_one(&self, column: &str, value: &str) -> DbResult<Option<User>> {
        let mut conn = self.db.connect().await?;
        let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&mut conn)
            .await
            .map_err(db_error(format!("failed to find user by {}", column)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_many(&self, filter: &str) -> DbResult<Vec<User>> {
        let mut conn = self.db.connect().await?;
        let sql = format!(
            "SELECT {} FROM users {} ORDER BY username",
            USER_COLUMNS, filter
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&mut conn)
            .await
            .map_err(db_error("failed to list users"))?;

        rows.iter().map(row_to_user).collect()
    }

    async fn set_active(&self, id: Id, active: bool) -> DbResult<bool> {
        let mut conn = self.db.connect().await?;
        let result = sqlx::query("UPDATE users SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now())
            .bind(id)
            .execute(&mut conn)
            .await
            .map_err(db_error("failed to change user activation"))?;

        let changed = result.rows_affected() > 0;
        if changed {
            info!(user_id = id, active, "User activation changed");
        }
        Ok(changed)
    }

    async fn count_where(&self, filter: &str) -> DbResult<u64> {
        let mut conn = self.db.connect().await?;
        let sql = format!("SELECT COUNT(*) FROM users {}", filter);
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&mut conn)
            .await
            .map_err(db_error("failed to count users"))?;
        Ok(to_count(count))
    }

    async fn exists_where(&self, column: &str, value: &str) -> DbResult<bool> {
        let mut conn = self.db.connect().await?;
        let sql = format!("SELECT EXISTS(SELECT 1 FROM users WHERE {} = ?)", column);
        let exists: bool = sqlx::query_scalar(&sql)
            .bind(value)
            .fetch_one(&mut conn)
            .await
            .map_err(db_error(format!("failed to check user {}", column)))?;
        Ok(exists)
    }
}

impl<'a> UserRepository for SqliteUserRepository<'a> {
    #[instrument(skip_all, fields(username = %user.username))]
    async fn create(&self, user: &NewUser) -> DbResult<User> {
        user.validate()?;

        let created_at = now();
        let mut conn = self.db.connect().await?;
        let mut tx = conn
            .begin()
            .await
            .map_err(db_error("failed to begin transaction"))?;

        sqlx::query(
            r#"
            INSERT INTO users
                (username, email, password_hash, first_name, last_name, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(created_at)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("failed to create user"))?;

        let id = last_insert_id(&mut *tx).await?;
        tx.commit()
            .await
            .map_err(db_error("failed to commit user creation"))?;

        info!(user_id = id, "User created");

        Ok(User {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            active: true,
            created_at,
            updated_at: created_at,
            last_login_at: None,
        })
    }

    async fn find_by_id(&self, id: Id) -> DbResult<Option<User>> {
        let mut conn = self.db.connect().await?;
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut conn)
            .await
            .map_err(db_error("failed to find user by id"))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_by_username(&self, username: &str) -> DbResult<Option<User>> {
        self.find_one("username", username.trim()).await
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        self.find_one("email", &email.trim().to_lowercase()).await
    }

    async fn find_all(&self) -> DbResult<Vec<User>> {
        self.find_many("").await
    }

    async fn find_all_active(&self) -> DbResult<Vec<User>> {
        self.find_many("WHERE active = 1").await
    }

    #[instrument(skip_all, fields(user_id = user.id))]
    async fn update(&self, user: &User) -> DbResult<User> {
        user.validate()?;

        let updated_at = now();
        let mut conn = self.db.connect().await?;
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = ?, email = ?, password_hash = ?, first_name = ?, last_name = ?,
                active = ?, last_login_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.active)
        .bind(user.last_login_at)
        .bind(updated_at)
        .bind(user.id)
        .execute(&mut conn)
        .await
        .map_err(db_error("failed to update user"))?;

        if result.rows_affected() == 0 {
            return Err(DbError::UserNotFound { id: user.id });
        }

        debug!("User updated");

        Ok(User {
            updated_at,
            ..user.clone()
        })
    }

    async fn update_last_login(&self, id: Id) -> DbResult<()> {
        let mut conn = self.db.connect().await?;
        let timestamp = now();
        let result = sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
            .bind(timestamp)
            .bind(timestamp)
            .bind(id)
            .execute(&mut conn)
            .await
            .map_err(db_error("failed to record login"))?;

        if result.rows_affected() == 0 {
            return Err(DbError::UserNotFound { id });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Id) -> DbResult<bool> {
        let mut conn = self.db.connect().await?;
        let mut tx = conn
            .begin()
            .await
            .map_err(db_error("failed to begin transaction"))?;

        sqlx::query(
            "DELETE FROM recurring_todos WHERE todo_id IN (SELECT id FROM todos WHERE user_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("failed to delete user's recurring todos"))?;

        let todos = sqlx::query("DELETE FROM todos WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("failed to delete user's todos"))?;

        let projects = sqlx::query("DELETE FROM projects WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("failed to delete user's projects"))?;

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("failed to delete user"))?;

        tx.commit()
            .await
            .map_err(db_error("failed to commit user deletion"))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(
                todos = todos.rows_affected(),
                projects = projects.rows_affected(),
                "User deleted"
            );
        }
        Ok(deleted)
    }

    async fn deactivate(&self, id: Id) -> DbResult<bool> {
        self.set_active(id, false).await
    }

    async fn reactivate(&self, id: Id) -> DbResult<bool> {
        self.set_active(id, true).await
    }

    async fn exists(&self, id: Id) -> DbResult<bool> {
        let mut conn = self.db.connect().await?;
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(id)
            .fetch_one(&mut conn)
            .await
            .map_err(db_error("failed to check user"))?;
        Ok(exists)
    }

    async fn username_exists(&self, username: &str) -> DbResult<bool> {
        self.exists_where("username", username.trim()).await
    }

    async fn email_exists(&self, email: &str) -> DbResult<bool> {
        self.exists_where("email", &email.trim().to_lowercase())
            .await
    }

    async fn count(&self) -> DbResult<u64> {
        self.count_where("").await
    }

    async fn count_active(&self) -> DbResult<u64> {
        self.count_where("WHERE active = 1").await
    }
}
