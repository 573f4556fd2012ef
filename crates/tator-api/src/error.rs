//! Maps domain `AppError` to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use tator_core::error::{AppError, ErrorKind};

/// Standard API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

/// Handler error: an [`AppError`] that renders as JSON.
#[derive(Debug)]
pub struct ApiError(pub AppError);

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Status code and error code for `kind`.
    pub fn status_for(kind: ErrorKind) -> (StatusCode, &'static str) {
        match kind {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ErrorKind::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
            ErrorKind::Serialization => (StatusCode::BAD_REQUEST, "SERIALIZATION_ERROR"),
            ErrorKind::ServiceUnavailable | ErrorKind::Database | ErrorKind::Cache | ErrorKind::Queue => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            ErrorKind::ExternalService => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ErrorKind::Internal | ErrorKind::Configuration => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let (status, code) = Self::status_for(err.kind);
        if status.is_server_error() {
            tracing::error!(kind = %err.kind, error = %err, "Request failed");
        }

        let body = ApiErrorResponse {
            error: code.to_string(),
            message: err.message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(ApiError::status_for(ErrorKind::Validation).0, StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::status_for(ErrorKind::NotFound).0, StatusCode::NOT_FOUND);
        assert_eq!(ApiError::status_for(ErrorKind::Conflict).0, StatusCode::CONFLICT);
        assert_eq!(
            ApiError::status_for(ErrorKind::Cache).0,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::status_for(ErrorKind::Internal).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_carries_code_and_message() {
        let response = ApiError::from(AppError::not_found("Job 9 not found")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
