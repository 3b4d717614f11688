//! Error handling for the REST API server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;

use sheetlog_core::error::SheetlogError;
use tracing::error;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    // Common error constructors
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

// Convert from sheetlog-core errors
impl From<SheetlogError> for ApiError {
    fn from(err: SheetlogError) -> Self {
        let code = err.code().as_str();
        let suggestion = err.suggestion().map(str::to_string);

        let api_error = match &err {
            SheetlogError::InvalidInput { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, code, err.to_string())
            }
            SheetlogError::Schema { .. } | SheetlogError::NoData { .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, code, err.to_string())
            }
            SheetlogError::DuplicateKey { keys, total } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, code, err.to_string())
                    .with_details(json!({ "keys": keys, "total": total }))
            }
            SheetlogError::ConflictingVersion { .. } => {
                ApiError::new(StatusCode::CONFLICT, code, err.to_string())
            }
            SheetlogError::Cancelled { .. } => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, code, err.to_string())
            }
            _ => {
                error!(error = %err, code, "Request failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, code, err.to_string())
            }
        };

        match (suggestion, api_error.details.is_none()) {
            (Some(suggestion), true) => api_error.with_details(json!({ "suggestion": suggestion })),
            _ => api_error,
        }
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sheetlog_core::error::ErrorCode;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (SheetlogError::invalid_input("empty"), StatusCode::BAD_REQUEST),
            (SheetlogError::schema("missing"), StatusCode::UNPROCESSABLE_ENTITY),
            (
                SheetlogError::no_data("none", ErrorCode::ImpNoSurvivingRows),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                SheetlogError::conflicting_version("stale"),
                StatusCode::CONFLICT,
            ),
            (
                SheetlogError::persistence("disk full"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_duplicate_key_details() {
        let api = ApiError::from(SheetlogError::duplicate_key(vec!["7".to_string()], 2));
        assert_eq!(api.code, "IMP_004");
        let details = api.details.unwrap();
        assert_eq!(details["keys"], json!(["7"]));
        assert_eq!(details["total"], json!(2));
    }
}
