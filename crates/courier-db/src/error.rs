//! Database error types.

use rusqlite::ErrorCode;
use rusqlite::ffi;
use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A UNIQUE or PRIMARY KEY constraint rejected the write.
    #[error("{entity} already exists")]
    Conflict { entity: &'static str },

    #[error("database lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Turns a uniqueness violation into `Conflict`, leaving other failures alone.
    pub(crate) fn unique(err: rusqlite::Error, entity: &'static str) -> Self {
        if is_unique_violation(&err) {
            DbError::Conflict { entity }
        } else {
            DbError::Sqlite(err)
        }
    }
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}
