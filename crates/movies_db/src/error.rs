//! Error types for the database layer.

use thiserror::Error;

/// Database operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Resource not found
    #[error("{0} not found with id: {1}")]
    NotFound(&'static str, i64),

    /// Unique-key or association conflict
    #[error("{0} already exists: {1}")]
    Duplicate(&'static str, String),

    /// Invalid database URL or configuration
    #[error("Invalid database configuration: {0}")]
    Config(String),

    /// Serialization error (e.g. genre list, poster metadata)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound(entity, id)
    }

    pub fn duplicate(entity: &'static str, key: impl Into<String>) -> Self {
        Self::Duplicate(entity, key.into())
    }

    /// True when the underlying sqlx error is sqlx's "no rows returned"
    /// sentinel.
    pub fn is_sqlx_not_found(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::RowNotFound)
    }

    /// Normalize the driver's "no rows" sentinel into a domain not-found
    /// error; pass other errors through unchanged.
    pub fn wrap_not_found(err: sqlx::Error, entity: &'static str, id: i64) -> Self {
        if Self::is_sqlx_not_found(&err) {
            Self::NotFound(entity, id)
        } else {
            Self::Sqlx(err)
        }
    }
}
