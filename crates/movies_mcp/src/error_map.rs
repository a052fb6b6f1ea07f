//! Maps [`movies_core::ServiceError`] onto the JSON-RPC error shape
//! (`spec.md` §7). Services construct `ServiceError`; this module is the
//! only place that knows what wire code each variant gets.

use movies_core::ServiceError;
use movies_protocol::{ErrorCode, JsonRpcError};

pub fn service_error(err: ServiceError) -> JsonRpcError {
    match err {
        ServiceError::InvalidArgument(detail) => {
            JsonRpcError::new(ErrorCode::InvalidParams, format!("Invalid parameters: {detail}"))
        }
        ServiceError::NotFound { entity, id } => JsonRpcError::new(
            ErrorCode::InvalidParams,
            format!("{entity} not found with id: {id}"),
        ),
        ServiceError::Duplicate { entity, key } => JsonRpcError::new(
            ErrorCode::InvalidParams,
            format!("{entity} already exists: {key}"),
        ),
        ServiceError::Timeout { op } => {
            JsonRpcError::new(ErrorCode::InternalError, format!("Operation timed out: {op}"))
        }
        ServiceError::PersistenceError => {
            JsonRpcError::new(ErrorCode::InternalError, "Internal error")
        }
        ServiceError::ServiceUnavailable => {
            JsonRpcError::new(ErrorCode::InternalError, "Service temporarily unavailable")
        }
    }
}

/// A malformed `arguments` object (missing required field, wrong type, or an
/// unknown field rejected by `#[serde(deny_unknown_fields)]`) is always
/// `invalid_params`.
pub fn bad_arguments(err: serde_json::Error) -> JsonRpcError {
    JsonRpcError::new(ErrorCode::InvalidParams, format!("Invalid parameters: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_invalid_params() {
        let mapped = service_error(ServiceError::NotFound {
            entity: "movie",
            id: 5,
        });
        assert_eq!(mapped.code, ErrorCode::InvalidParams.as_i32());
        assert!(mapped.message.contains("movie not found with id: 5"));
    }

    #[test]
    fn timeout_maps_to_internal_error() {
        let mapped = service_error(ServiceError::Timeout { op: "search_movies" });
        assert_eq!(mapped.code, ErrorCode::InternalError.as_i32());
    }
}
