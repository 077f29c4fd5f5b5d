//! SQLite implementation of the database traits.
//!
//! This module provides a SQLite-backed implementation of the repository
//! traits defined in the parent module.

mod connection;
mod helpers;
mod mapper;
mod project;
pub mod schema;
mod todo;
mod user;

#[cfg(test)]
mod connection_test;
#[cfg(test)]
mod critical_tests;
#[cfg(test)]
mod todo_test;

pub use connection::SqliteDatabase;
pub use project::SqliteProjectRepository;
pub use schema::{DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_ID, DEFAULT_ADMIN_USERNAME, SchemaState};
pub use todo::SqliteTodoRepository;
pub use user::SqliteUserRepository;
