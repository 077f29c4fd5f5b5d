use miette::Diagnostic;
use thiserror::Error;

use crate::db::DbError;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error("Database error: {0}")]
    #[diagnostic(code(todos::cli::database))]
    Database(#[from] DbError),

    #[error("Database at {target} is not reachable")]
    #[diagnostic(
        code(todos::cli::unhealthy),
        help("Check that the file exists and is readable, or pass --db to point at another one")
    )]
    Unhealthy { target: String },
}

pub type CliResult<T> = Result<T, CliError>;
