//! Database error types.
//!
//! Driver failures are wrapped into a small set of kinds that keep the
//! original `sqlx::Error` as their source. Not-found conditions are
//! distinct per entity and carry the missing id.

use miette::Diagnostic;
use thiserror::Error;

use crate::auth::CredentialError;
use crate::db::Id;

/// Database operation errors.
#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("User not found: {id}")]
    #[diagnostic(code(todos::db::user_not_found))]
    UserNotFound { id: Id },

    #[error("Project not found: {id}")]
    #[diagnostic(code(todos::db::project_not_found))]
    ProjectNotFound { id: Id },

    #[error("Todo not found: {id}")]
    #[diagnostic(code(todos::db::todo_not_found))]
    TodoNotFound { id: Id },

    #[error("Invalid data: {message}")]
    #[diagnostic(code(todos::db::invalid_data))]
    InvalidData {
        message: String,
        #[help]
        help: String,
    },

    #[error("Validation error: {message}")]
    #[diagnostic(code(todos::db::validation_error))]
    Validation { message: String },

    #[error("Database error: {message}")]
    #[diagnostic(code(todos::db::database_error))]
    Database {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Migration error: {message}")]
    #[diagnostic(
        code(todos::db::migration_error),
        help("The schema could not be created or upgraded; startup cannot continue.")
    )]
    Migration {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Connection error: {message}")]
    #[diagnostic(code(todos::db::connection_error))]
    Connection {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Constraint violation: {message}")]
    #[diagnostic(code(todos::db::constraint))]
    Constraint {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Credential(#[from] CredentialError),
}

impl DbError {
    /// True for any of the per-entity not-found kinds.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DbError::UserNotFound { .. }
                | DbError::ProjectNotFound { .. }
                | DbError::TodoNotFound { .. }
        )
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
