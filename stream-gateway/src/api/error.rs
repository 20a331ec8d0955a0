//! API error handling.
//!
//! Every error response has the shape
//! `{"success": false, "error": CODE, "message": ..., ...extra}`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Error;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    /// Error code for programmatic handling
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Additional top-level fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub extra: Map<String, Value>,
    /// Sent as the `Retry-After` header, in seconds.
    pub retry_after: Option<u64>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            extra: Map::new(),
            retry_after: None,
        }
    }

    /// Add a top-level field to the body.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Set the `Retry-After` header and the `retryAfter` body field.
    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs);
        self.with_field("retryAfter", secs)
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Create a 401 Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// Create a 404 Not Found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Create a 429 Too Many Requests error.
    pub fn too_many_requests(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, code, message)
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// Create a 502 Bad Gateway error.
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "BAD_GATEWAY", message)
    }

    /// Create a 503 Service Unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            success: false,
            error: self.code,
            message: self.message,
            extra: self.extra,
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidMediaType(kind) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_TYPE",
                format!("Invalid type '{}', expected movie or series", kind),
            ),
            Error::ProviderNotFound(name) => ApiError::new(
                StatusCode::NOT_FOUND,
                "PROVIDER_NOT_FOUND",
                format!("Provider '{}' not found", name),
            ),
            Error::ProviderDisabled(name) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "PROVIDER_DISABLED",
                format!("Provider '{}' is disabled", name),
            ),
            _ => {
                tracing::error!("Unexpected error: {}", err);
                ApiError::internal(err.to_string())
            }
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_api_error_creation() {
        let err = ApiError::not_found("Nothing here");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.message, "Nothing here");
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::new(StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", "nope")
            .with_field("remaining", 3)
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({
                "success": false,
                "error": "INVALID_CREDENTIALS",
                "message": "nope",
                "remaining": 3
            })
        );
    }

    #[tokio::test]
    async fn test_retry_after_header() {
        let response = ApiError::too_many_requests("LOCKED", "locked")
            .with_retry_after(300)
            .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "300");
        assert_eq!(body_json(response).await["retryAfter"], 300);
    }

    #[test]
    fn test_from_domain_error() {
        let err: ApiError = Error::InvalidMediaType("tv".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "INVALID_TYPE");

        let err: ApiError = Error::ProviderDisabled("x".to_string()).into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = Error::resolver("tmdb down").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "INTERNAL_ERROR");

        let err: ApiError = Error::Server("bind failed".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "INTERNAL_ERROR");
    }
}
