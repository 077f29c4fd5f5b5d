//! Shared helper functions for SQLite repositories.

use sqlx::SqliteConnection;

use crate::db::{DbError, DbResult, Id};

/// Build a mapper from `sqlx::Error` to [`DbError`].
///
/// Unique and foreign-key violations become `Constraint`, everything
/// else `Database`. The driver error is kept as the source either way.
pub fn db_error(message: impl Into<String>) -> impl FnOnce(sqlx::Error) -> DbError {
    let message = message.into();
    move |source| {
        let constraint = match &source {
            sqlx::Error::Database(e) if e.is_unique_violation() || e.is_foreign_key_violation() => {
                Some(e.message().to_string())
            }
            _ => None,
        };

        match constraint {
            Some(detail) => DbError::Constraint {
                message: format!("{}: {}", message, detail),
                source,
            },
            None => DbError::Database { message, source },
        }
    }
}

/// Id assigned by the most recent INSERT on this connection.
///
/// Must run on the same connection as the INSERT with no statement in
/// between; callers run both inside one transaction.
pub async fn last_insert_id(conn: &mut SqliteConnection) -> DbResult<Id> {
    sqlx::query_scalar::<_, i64>("SELECT last_insert_rowid()")
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error("failed to read last inserted row id"))
}

/// Convert a `COUNT(*)` result to an unsigned count.
pub fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// Escape LIKE wildcards so `term` matches literally under `ESCAPE '\'`.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_map_to_database_kind() {
        let err = db_error("failed to query todos")(sqlx::Error::RowNotFound);
        assert!(matches!(
            err,
            DbError::Database { ref message, .. } if message == "failed to query todos"
        ));
    }

    #[test]
    fn negative_counts_clamp_to_zero() {
        assert_eq!(to_count(-1), 0);
        assert_eq!(to_count(12), 12);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), r"50\%\_off");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("plain"), "plain");
    }
}
