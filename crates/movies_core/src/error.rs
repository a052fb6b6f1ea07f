//! Domain-service error taxonomy.
//!
//! Every service method returns one of these variants; none of them ever
//! carry a raw [`movies_db::DbError`] or [`movies_validate::ValidationErrors`]
//! across the service boundary. The dispatcher in `movies_mcp` owns the
//! mapping from `ServiceError` onto JSON-RPC error codes.

use movies_db::DbError;
use movies_validate::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("Invalid parameters: {0}")]
    InvalidArgument(String),

    #[error("{entity} not found with id: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{entity} already exists: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("Operation timed out: {op}")]
    Timeout { op: &'static str },

    #[error("Internal error")]
    PersistenceError,

    #[error("Service temporarily unavailable")]
    ServiceUnavailable,
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(entity, id) => Self::NotFound { entity, id },
            DbError::Duplicate(entity, key) => Self::Duplicate { entity, key },
            DbError::Sqlx(_) | DbError::Serialization(_) | DbError::Config(_) => {
                tracing::error!(error = %err, "repository operation failed");
                Self::PersistenceError
            }
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        let names: Vec<&str> = err.fields().iter().map(|f| f.field.as_str()).collect();
        Self::InvalidArgument(names.join(", "))
    }
}
