use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Database(_) => "STORE_DATABASE_ERROR",
            StoreError::Conflict(_) => "STORE_CONFLICT",
            StoreError::NotFound(_) => "STORE_NOT_FOUND",
            StoreError::Serialization(_) => "STORE_SERIALIZATION_ERROR",
            StoreError::InvalidData(_) => "STORE_INVALID_DATA",
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// True if `err` is a SQLite UNIQUE/PRIMARY KEY constraint violation.
///
/// Centralised here because every idempotent insert in this crate needs to
/// distinguish "benign race, someone else already wrote this row" from a
/// real database failure, and rusqlite doesn't surface that as its own
/// error variant.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                ..
            },
            _,
        )
    )
}
