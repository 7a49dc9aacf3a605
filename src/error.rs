//! Error types for elohim-things
//!
//! Every failure that leaves the crate is one of a handful of kinds. Store
//! errors are classified here and never surface as raw SQLite errors.

use rusqlite::ffi;
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThingsError {
    #[error("Malformed entity: {0}")]
    MalformedEntity(String),

    #[error("Entity already exists: {0}")]
    Conflict(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Boundary classification of a [`ThingsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedEntity,
    Conflict,
    NotFound,
    Cancelled,
    Internal,
}

impl ThingsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ThingsError::MalformedEntity(_) => ErrorKind::MalformedEntity,
            ThingsError::Conflict(_) => ErrorKind::Conflict,
            ThingsError::NotFound(_) => ErrorKind::NotFound,
            ThingsError::Cancelled(_) => ErrorKind::Cancelled,
            ThingsError::Io(_) | ThingsError::Config(_) | ThingsError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Classify a SQLite failure.
///
/// Unique and primary key violations become `Conflict`, foreign key violations
/// become `NotFound` (the referenced row is missing or owned by someone else),
/// interruptions become `Cancelled`. `context` names the operation and ends up
/// in the message.
pub fn classify(err: rusqlite::Error, context: &str) -> ThingsError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            match e.extended_code {
                ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    ThingsError::Conflict(context.to_string())
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ThingsError::NotFound(context.to_string()),
                _ => ThingsError::Internal(format!("{}: {}", context, err)),
            }
        }
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::OperationInterrupted => {
            ThingsError::Cancelled(context.to_string())
        }
        _ => ThingsError::Internal(format!("{}: {}", context, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(extended_code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(extended_code), None)
    }

    #[test]
    fn test_classify_constraint_violations() {
        let err = classify(sqlite_failure(ffi::SQLITE_CONSTRAINT_PRIMARYKEY), "save thing");
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = classify(sqlite_failure(ffi::SQLITE_CONSTRAINT_UNIQUE), "save thing");
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = classify(sqlite_failure(ffi::SQLITE_CONSTRAINT_FOREIGNKEY), "connect");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = classify(sqlite_failure(ffi::SQLITE_CONSTRAINT_NOTNULL), "save thing");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_classify_interrupt() {
        let err = classify(sqlite_failure(ffi::SQLITE_INTERRUPT), "retrieve all");
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_classify_hides_raw_errors() {
        let err = classify(rusqlite::Error::QueryReturnedNoRows, "retrieve thing");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().starts_with("Internal error: retrieve thing"));
    }
}
