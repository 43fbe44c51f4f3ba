use thiserror::Error;

/// Failures at the storage boundary.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// The store rejected a row because of a referential constraint.
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Fault raised on purpose by the in-memory store.
    #[error("injected failure: {0}")]
    Injected(String),
}

pub type DbResult<T> = std::result::Result<T, DbError>;
