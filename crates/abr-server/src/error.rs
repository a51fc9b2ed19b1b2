//! Error types for the ABR business search HTTP API (§7).
//!
//! `ApiError` is the single error type every fallible handler returns via
//! `Result<T, ApiError>`; the error mapper is the terminal handler in the
//! request pipeline (§4.6.2). Every variant that should leak its message is
//! distinct from `Internal`, whose message is always replaced with the
//! literal `"Internal server error"` before serialization.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use abr_persistence::StorageError;

/// The primary error type for ABR API operations.
#[derive(Debug)]
pub enum ApiError {
    /// By-key lookup miss (HTTP 404).
    NotFound(String),
    /// Bad input: missing `filePath`, unknown `technique`/`mode`, malformed
    /// query parameters (HTTP 400).
    Validation(String),
    /// Upsert integrity violation that should not occur under the Batch
    /// Writer's invariants (HTTP 409).
    Conflict(String),
    /// The `mode=ai` search path (HTTP 501).
    NotImplemented(String),
    /// Anything else, including transient failures whose retries were
    /// exhausted (HTTP 500). The message is never serialized as-is.
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::NotFound(m)
            | ApiError::Validation(m)
            | ApiError::Conflict(m)
            | ApiError::NotImplemented(m)
            | ApiError::Internal(m) => write!(f, "{m}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::NotImplemented(message) => (StatusCode::NOT_IMPLEMENTED, message),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "status": "error", "message": message }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { abn } => ApiError::NotFound(format!("Business not found: {abn}")),
            StorageError::Conflict { message } => ApiError::Conflict(message),
            StorageError::Validation { message } => ApiError::Validation(message),
            StorageError::Transient(e) => ApiError::Internal(e.to_string()),
            StorageError::Pool(e) => ApiError::Internal(e.to_string()),
            StorageError::Unexpected(e) => ApiError::Internal(e.to_string()),
        }
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let response = ApiError::NotFound("Business not found: 123".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn internal_error_never_leaks_its_message() {
        let response = ApiError::Internal("connection reset by peer".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["message"], "Internal server error");
    }

    #[tokio::test]
    async fn not_implemented_maps_to_501() {
        let response = ApiError::NotImplemented("mode=ai is not implemented".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[test]
    fn storage_not_found_converts_to_api_not_found() {
        let err: ApiError = StorageError::NotFound { abn: "51824753556".to_string() }.into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn storage_transient_converts_to_internal() {
        let pool_err = deadpool_postgres::PoolError::Timeout(deadpool_postgres::TimeoutType::Wait);
        let err: ApiError = StorageError::Pool(pool_err).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
