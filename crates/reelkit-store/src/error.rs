//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the embedded database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt column {column}: {message}")]
    Corrupt { column: String, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn corrupt(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_reference(what: impl Into<String>) -> Self {
        Self::InvalidReference(what.into())
    }

    /// True for SQLITE_BUSY-style lock contention worth retrying.
    pub fn is_lock_contention(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db) => {
                let msg = db.message().to_lowercase();
                msg.contains("locked") || msg.contains("busy")
            }
            _ => false,
        }
    }

    /// True when the underlying error is a UNIQUE constraint violation.
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
    }
}
