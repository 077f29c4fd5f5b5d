//! Database target resolution.
//!
//! Provides XDG-style path resolution for the database file and the
//! `TODOS_DB` environment override.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the default database location.
pub const DB_ENV_VAR: &str = "TODOS_DB";

/// Value of `TODOS_DB` (or `--db`) selecting the in-memory target.
pub const IN_MEMORY: &str = ":memory:";

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// A SQLite file, created on first open.
    File(PathBuf),
    /// An ephemeral database that disappears with its context.
    InMemory,
}

impl DatabaseTarget {
    /// Resolve the target from `TODOS_DB`, falling back to [`default_db_path`].
    pub fn from_env() -> Self {
        match env::var(DB_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => Self::parse(&value),
            _ => Self::File(default_db_path()),
        }
    }

    /// Interpret a user-supplied location.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value == IN_MEMORY {
            Self::InMemory
        } else {
            Self::File(PathBuf::from(value))
        }
    }

    /// Path of the database file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::InMemory => None,
        }
    }
}

impl Default for DatabaseTarget {
    fn default() -> Self {
        Self::File(default_db_path())
    }
}

impl fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::InMemory => write!(f, "{}", IN_MEMORY),
        }
    }
}

/// Data directory: `$XDG_DATA_HOME/todos` or `~/.local/share/todos`.
///
/// Returns `None` when neither `XDG_DATA_HOME` nor `HOME` is set.
pub fn data_dir() -> Option<PathBuf> {
    let data_home = env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .ok()?;

    Some(data_home.join("todos"))
}

/// Default database file (`data_dir()/todos.db`, or `./todos.db`).
pub fn default_db_path() -> PathBuf {
    data_dir()
        .map(|dir| dir.join("todos.db"))
        .unwrap_or_else(|| PathBuf::from("todos.db"))
}
