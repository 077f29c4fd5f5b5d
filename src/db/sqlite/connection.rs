//! SQLite connection provider and schema bootstrap.

use std::str::FromStr;
use std::sync::Mutex;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::schema;
use super::{SqliteProjectRepository, SqliteTodoRepository, SqliteUserRepository};
use crate::config::DatabaseTarget;
use crate::db::{Database, DbError, DbResult};

/// SQLite database context.
///
/// Constructed once at process start and handed to whatever needs
/// persistence. Every repository call opens its own connection through
/// [`SqliteDatabase::connect`] and drops it before returning.
pub struct SqliteDatabase {
    target: DatabaseTarget,
    options: SqliteConnectOptions,
    // Shared-cache in-memory databases vanish with their last connection.
    _anchor: Option<Mutex<SqliteConnection>>,
    schema: OnceCell<()>,
}

impl SqliteDatabase {
    /// Open a database context for the given target.
    ///
    /// File targets get their parent directory and file created on demand.
    /// Nothing touches the schema until [`Database::ensure_schema`].
    pub async fn open(target: DatabaseTarget) -> DbResult<Self> {
        let options = match &target {
            DatabaseTarget::File(path) => {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| DbError::Connection {
                            message: format!("failed to create directory {}", parent.display()),
                            source: sqlx::Error::Io(e),
                        })?;
                }
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
            }
            // sqlx gives every parsed `:memory:` a unique shared-cache name,
            // so clones of these options reach the same database.
            DatabaseTarget::InMemory => {
                SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                    DbError::Connection {
                        message: "invalid in-memory connection options".to_string(),
                        source: e,
                    }
                })?
            }
        }
        .foreign_keys(true);

        let anchor = match &target {
            DatabaseTarget::InMemory => Some(Mutex::new(connect_with(&options, &target).await?)),
            DatabaseTarget::File(_) => None,
        };

        debug!(target = %target, "Opened database context");

        Ok(Self {
            target,
            options,
            _anchor: anchor,
            schema: OnceCell::new(),
        })
    }

    /// Create an in-memory database (useful for testing).
    pub async fn in_memory() -> DbResult<Self> {
        Self::open(DatabaseTarget::InMemory).await
    }

    pub fn target(&self) -> &DatabaseTarget {
        &self.target
    }

    /// Open a fresh autocommit connection.
    ///
    /// The connection closes when dropped, so `?` early returns and
    /// panics release it too.
    pub async fn connect(&self) -> DbResult<SqliteConnection> {
        connect_with(&self.options, &self.target).await
    }
}

async fn connect_with(
    options: &SqliteConnectOptions,
    target: &DatabaseTarget,
) -> DbResult<SqliteConnection> {
    options.connect().await.map_err(|e| DbError::Connection {
        message: format!("unable to open database {}", target),
        source: e,
    })
}

impl Database for SqliteDatabase {
    type Users<'a> = SqliteUserRepository<'a>;
    type Projects<'a> = SqliteProjectRepository<'a>;
    type Todos<'a> = SqliteTodoRepository<'a>;

    /// Runs the schema manager at most once per context. Concurrent callers
    /// wait on the single initializer; a failed run is retried by the next
    /// caller rather than cached.
    async fn ensure_schema(&self) -> DbResult<()> {
        self.schema
            .get_or_try_init(|| async {
                let mut conn = self.connect().await?;
                schema::ensure_schema(&mut conn).await.map(|_| ())
            })
            .await?;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        let result = async {
            let mut conn = self.connect().await?;
            sqlx::query("SELECT 1")
                .execute(&mut conn)
                .await
                .map_err(|e| DbError::Database {
                    message: "health check query failed".to_string(),
                    source: e,
                })?;
            conn.close().await.map_err(|e| DbError::Connection {
                message: "failed to close health check connection".to_string(),
                source: e,
            })
        }
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                false
            }
        }
    }

    fn users(&self) -> Self::Users<'_> {
        SqliteUserRepository { db: self }
    }

    fn projects(&self) -> Self::Projects<'_> {
        SqliteProjectRepository { db: self }
    }

    fn todos(&self) -> Self::Todos<'_> {
        SqliteTodoRepository { db: self }
    }
}
