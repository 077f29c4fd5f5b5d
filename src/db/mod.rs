//! Database abstraction layer.
//!
//! Trait-based data access so the storage backend stays swappable.
//!
//! # Architecture
//!
//! - `error`: Storage-agnostic error types
//! - `models`: Domain entities (User, Project, Todo)
//! - `repository`: Trait definitions for data access
//! - `sqlite`: SQLite implementation (schema, row mapping, repositories)

mod error;
mod models;
mod repository;
pub mod sqlite;
pub mod utils;


pub use error::{DbError, DbResult};
pub use models::*;
pub use repository::*;
pub use sqlite::SqliteDatabase;
