//! Schema bootstrap and legacy migration.
//!
//! The schema is inspected through the column list of `todos`:
//!
//! - no `todos` table: fresh install, create everything
//! - `todos` without `user_id`: legacy layout, migrate in place
//! - `todos` with `user_id`: current, nothing to do
//!
//! Fresh creation and migration each run in a single transaction.

use sqlx::{Connection, SqliteConnection};
use tracing::{debug, error, info, warn};

use crate::auth::CredentialHasher;
use crate::db::utils::now;
use crate::db::{DbError, DbResult, Id};

/// Id of the bootstrap administrator. Legacy rows are assigned to it.
pub const DEFAULT_ADMIN_ID: Id = 1;

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@localhost.com";

// Bootstrap only; the surrounding application forces a change on first login.
const DEFAULT_ADMIN_PASSWORD: &str = "admin";

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        first_name TEXT,
        last_name TEXT,
        active BOOLEAN NOT NULL DEFAULT 1,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        last_login_at DATETIME
    )
"#;

const CREATE_PROJECTS: &str = r#"
    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        start_date DATE,
        end_date DATE,
        user_id INTEGER NOT NULL DEFAULT 1,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    )
"#;

const CREATE_TODOS: &str = r#"
    CREATE TABLE IF NOT EXISTS todos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT,
        due_date DATE,
        priority TEXT NOT NULL DEFAULT 'MEDIUM',
        status TEXT NOT NULL DEFAULT 'TODO',
        project_id INTEGER,
        user_id INTEGER NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    )
"#;

const CREATE_RECURRING_TODOS: &str = r#"
    CREATE TABLE IF NOT EXISTS recurring_todos (
        todo_id INTEGER PRIMARY KEY,
        recurring_interval_days INTEGER NOT NULL,
        max_occurrences INTEGER NOT NULL DEFAULT 2147483647,
        current_occurrence INTEGER NOT NULL DEFAULT 1,
        next_due_date DATE,
        FOREIGN KEY (todo_id) REFERENCES todos(id) ON DELETE CASCADE
    )
"#;

const CREATE_INDEXES: [&str; 9] = [
    "CREATE INDEX IF NOT EXISTS idx_users_username ON users(username)",
    "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
    "CREATE INDEX IF NOT EXISTS idx_users_active ON users(active)",
    "CREATE INDEX IF NOT EXISTS idx_projects_user_id ON projects(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_todos_project_id ON todos(project_id)",
    "CREATE INDEX IF NOT EXISTS idx_todos_user_id ON todos(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_todos_status ON todos(status)",
    "CREATE INDEX IF NOT EXISTS idx_todos_priority ON todos(priority)",
    "CREATE INDEX IF NOT EXISTS idx_todos_due_date ON todos(due_date)",
];

/// Layout found on disk before bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// No `todos` table.
    Fresh,
    /// `todos` exists without the `user_id` owner column.
    Legacy,
    /// Already on the current layout.
    Current,
}

/// Create or migrate the schema as needed. Safe to call repeatedly.
///
/// Returns the state that was detected before any change was made.
pub async fn ensure_schema(conn: &mut SqliteConnection) -> DbResult<SchemaState> {
    let result = bootstrap(conn).await;
    if let Err(e) = &result {
        error!(error = %e, "Failed to initialize database schema");
    }
    result
}

async fn bootstrap(conn: &mut SqliteConnection) -> DbResult<SchemaState> {
    let state = detect_state(conn).await?;

    match state {
        SchemaState::Current => {
            debug!("Schema is current, nothing to migrate");
            return Ok(state);
        }
        SchemaState::Fresh => info!("Creating fresh database schema"),
        SchemaState::Legacy => info!("Legacy schema detected, migrating to owner-aware layout"),
    }

    let admin_hash = CredentialHasher::new().hash(DEFAULT_ADMIN_PASSWORD)?;

    let mut tx = conn
        .begin()
        .await
        .map_err(migration_error("failed to begin schema transaction"))?;

    match state {
        SchemaState::Fresh => create_fresh_schema(&mut *tx, &admin_hash).await?,
        SchemaState::Legacy => migrate_legacy_schema(&mut *tx, &admin_hash).await?,
        SchemaState::Current => {}
    }

    tx.commit()
        .await
        .map_err(migration_error("failed to commit schema changes"))?;

    info!(?state, "Database schema initialized");
    Ok(state)
}

/// Classify the on-disk layout from the column list of `todos`.
///
/// A lookup failing because `todos` does not exist counts as a fresh
/// install; any other failure aborts.
pub async fn detect_state(conn: &mut SqliteConnection) -> DbResult<SchemaState> {
    let columns = match table_columns(conn, "todos").await {
        Ok(columns) => columns,
        Err(e) if is_missing_table(&e) => {
            debug!(error = %e, "todos table missing, assuming fresh install");
            return Ok(SchemaState::Fresh);
        }
        Err(e) => {
            return Err(DbError::Migration {
                message: "failed to inspect todos table".to_string(),
                source: e,
            });
        }
    };

    let state = if columns.is_empty() {
        SchemaState::Fresh
    } else if columns.iter().any(|c| c == "user_id") {
        SchemaState::Current
    } else {
        SchemaState::Legacy
    };

    Ok(state)
}

async fn create_fresh_schema(conn: &mut SqliteConnection, admin_hash: &str) -> DbResult<()> {
    execute(conn, CREATE_USERS, "failed to create users table").await?;
    // A legacy install may have created projects before any todo existed.
    if table_exists(conn, "projects").await? {
        adopt_legacy_projects(conn).await?;
    } else {
        execute(conn, CREATE_PROJECTS, "failed to create projects table").await?;
    }
    execute(conn, CREATE_TODOS, "failed to create todos table").await?;
    execute(
        conn,
        CREATE_RECURRING_TODOS,
        "failed to create recurring_todos table",
    )
    .await?;
    create_indexes(conn).await?;
    insert_default_admin(conn, admin_hash).await
}

async fn migrate_legacy_schema(conn: &mut SqliteConnection, admin_hash: &str) -> DbResult<()> {
    execute(conn, CREATE_USERS, "failed to create users table").await?;
    // The admin must exist before legacy rows default to it.
    insert_default_admin(conn, admin_hash).await?;

    if table_exists(conn, "projects").await? {
        adopt_legacy_projects(conn).await?;
    } else {
        execute(conn, CREATE_PROJECTS, "failed to create projects table").await?;
    }

    add_owner_column(conn, "todos").await?;
    normalize_dates(conn, "todos", &["due_date"], &["created_at", "updated_at"]).await?;

    execute(
        conn,
        CREATE_RECURRING_TODOS,
        "failed to create recurring_todos table",
    )
    .await?;
    create_indexes(conn).await?;

    info!("Legacy schema migration completed");
    Ok(())
}

/// Add `user_id` defaulting to the bootstrap admin, unless already present.
async fn add_owner_column(conn: &mut SqliteConnection, table: &'static str) -> DbResult<()> {
    let columns = table_columns(conn, table)
        .await
        .map_err(migration_error(format!("failed to inspect {} table", table)))?;

    if columns.iter().any(|c| c == "user_id") {
        debug!(table, "user_id column already present");
        return Ok(());
    }

    // SQLite refuses ADD COLUMN with both REFERENCES and a non-null default
    // while foreign keys are enforced, so the owner link is index-only here.
    let sql = format!(
        "ALTER TABLE {} ADD COLUMN user_id INTEGER NOT NULL DEFAULT {}",
        table, DEFAULT_ADMIN_ID
    );
    execute(conn, &sql, &format!("failed to add user_id to {}", table)).await?;
    info!(table, "Added user_id column");
    Ok(())
}

async fn adopt_legacy_projects(conn: &mut SqliteConnection) -> DbResult<()> {
    add_owner_column(conn, "projects").await?;
    normalize_dates(
        conn,
        "projects",
        &["start_date", "end_date"],
        &["created_at", "updated_at"],
    )
    .await
}

/// Rewrite epoch-millisecond integers left by the legacy application as
/// ISO text. Dates were written at local midnight, timestamps as instants.
async fn normalize_dates(
    conn: &mut SqliteConnection,
    table: &'static str,
    dates: &[&'static str],
    timestamps: &[&'static str],
) -> DbResult<()> {
    let rewrites = dates
        .iter()
        .map(|c| (*c, format!("date({c} / 1000, 'unixepoch', 'localtime')")))
        .chain(
            timestamps
                .iter()
                .map(|c| (*c, format!("datetime({c} / 1000, 'unixepoch')"))),
        );

    for (column, conversion) in rewrites {
        let sql = format!(
            "UPDATE {table} SET {column} = {conversion} WHERE typeof({column}) = 'integer'"
        );
        let result = sqlx::query(&sql)
            .execute(&mut *conn)
            .await
            .map_err(migration_error(format!(
                "failed to convert {}.{} to ISO text",
                table, column
            )))?;

        if result.rows_affected() > 0 {
            info!(table, column, rows = result.rows_affected(), "Converted epoch dates");
        }
    }
    Ok(())
}

async fn create_indexes(conn: &mut SqliteConnection) -> DbResult<()> {
    for sql in CREATE_INDEXES {
        execute(conn, sql, "failed to create index").await?;
    }
    Ok(())
}

async fn insert_default_admin(conn: &mut SqliteConnection, admin_hash: &str) -> DbResult<()> {
    let timestamp = now();
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO users
            (id, username, email, password_hash, first_name, last_name, active, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'Admin', 'User', 1, ?, ?)
        "#,
    )
    .bind(DEFAULT_ADMIN_ID)
    .bind(DEFAULT_ADMIN_USERNAME)
    .bind(DEFAULT_ADMIN_EMAIL)
    .bind(admin_hash)
    .bind(timestamp)
    .bind(timestamp)
    .execute(&mut *conn)
    .await
    .map_err(migration_error("failed to create default admin user"))?;

    if result.rows_affected() > 0 {
        warn!(
            username = DEFAULT_ADMIN_USERNAME,
            "Default admin account created with the bootstrap password; change it after first login"
        );
    } else {
        debug!("Default admin account already present");
    }

    Ok(())
}

async fn table_exists(conn: &mut SqliteConnection, table: &str) -> DbResult<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(&mut *conn)
            .await
            .map_err(migration_error(format!("failed to look up table {}", table)))?;
    Ok(count > 0)
}

async fn table_columns(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
        .bind(table)
        .fetch_all(&mut *conn)
        .await
}

async fn execute(conn: &mut SqliteConnection, sql: &str, context: &str) -> DbResult<()> {
    sqlx::query(sql)
        .execute(&mut *conn)
        .await
        .map_err(migration_error(context))?;
    Ok(())
}

fn is_missing_table(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.message().contains("no such table"))
}

fn migration_error(message: impl Into<String>) -> impl FnOnce(sqlx::Error) -> DbError {
    let message = message.into();
    move |source| DbError::Migration { message, source }
}
