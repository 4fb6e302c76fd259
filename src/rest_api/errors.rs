//! # REST API Errors
//!
//! Error types for the REST API module. Every variant knows its HTTP status
//! and renders the `{"error": true, "message": …}` envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::model::ValidationErrors;
use crate::store::StoreError;

/// Result type for REST operations
pub type RestResult<T> = Result<T, RestError>;

/// REST API errors
#[derive(Debug, Clone, Error)]
pub enum RestError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Invalid query parameter
    #[error("Invalid query parameter: {0}")]
    InvalidQueryParam(String),

    /// Invalid filter expression
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Invalid request body
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// Payload failed schema validation; storage was not touched
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Write check failed against the target record
    #[error("{0}")]
    PermissionDenied(String),

    /// Identity lookup found no visible row
    #[error("{0}")]
    NotFound(String),

    // ==================
    // Auth Errors
    // ==================
    /// Authentication error
    #[error("{0}")]
    Auth(#[from] AuthError),

    // ==================
    // Storage Errors
    // ==================
    /// Unique or referential integrity violation, rolled back
    #[error("{message}")]
    Integrity {
        data: Value,
        message: String,
        operation: String,
    },

    /// Transient storage failure, rolled back
    #[error("{message}")]
    Operational {
        data: Value,
        message: String,
        operation: String,
    },

    /// Typed batch failure carrying its own status
    #[error("{message}")]
    Custom {
        data: Value,
        message: String,
        operation: String,
        status: u16,
    },

    // ==================
    // Server Errors (5xx)
    // ==================
    /// Internal error during query execution
    #[error("Internal error: {0}")]
    Internal(String),

    /// Resource registration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RestError {
    /// Wrap a storage failure for the write that caused it
    pub fn from_store(err: StoreError, data: Value, operation: &str) -> Self {
        match err {
            StoreError::Integrity(detail) => {
                warn!(operation, detail = %detail, "integrity error, rolled back");
                RestError::Integrity {
                    data,
                    message: "Integrity Error".to_string(),
                    operation: operation.to_string(),
                }
            }
            StoreError::Operational(detail) => {
                warn!(operation, detail = %detail, "operational error, rolled back");
                RestError::Operational {
                    data,
                    message: "Operational Error".to_string(),
                    operation: operation.to_string(),
                }
            }
            other => RestError::Internal(other.to_string()),
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            RestError::InvalidQueryParam(_) => StatusCode::BAD_REQUEST,
            RestError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            RestError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            RestError::Validation(_) => StatusCode::BAD_REQUEST,
            RestError::Integrity { .. } => StatusCode::BAD_REQUEST,
            RestError::Operational { .. } => StatusCode::BAD_REQUEST,

            // 401/403 from auth
            RestError::Auth(auth_err) => {
                StatusCode::from_u16(auth_err.status_code()).unwrap_or(StatusCode::UNAUTHORIZED)
            }

            // 403 Forbidden
            RestError::PermissionDenied(_) => StatusCode::FORBIDDEN,

            // 404 Not Found
            RestError::NotFound(_) => StatusCode::NOT_FOUND,

            RestError::Custom { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
            }

            // 500 Internal Server Error
            RestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RestError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON error envelope
    pub fn envelope(&self) -> Value {
        let mut body = json!({
            "error": true,
            "message": self.to_string(),
        });
        match self {
            RestError::Validation(errors) => {
                body["errors"] = json!(errors);
            }
            RestError::Integrity {
                data, operation, ..
            }
            | RestError::Operational {
                data, operation, ..
            }
            | RestError::Custom {
                data, operation, ..
            } => {
                body["data"] = data.clone();
                body["operation"] = Value::String(operation.clone());
            }
            _ => {}
        }
        body
    }
}

impl From<StoreError> for RestError {
    fn from(err: StoreError) -> Self {
        RestError::from_store(err, Value::Null, "reading resource")
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(self.envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RestError::InvalidQueryParam("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RestError::NotFound("Resource not found".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RestError::PermissionDenied("no".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            RestError::Internal("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_error_propagation() {
        let rest_err = RestError::from(AuthError::AuthenticationRequired);
        assert_eq!(rest_err.status_code(), StatusCode::UNAUTHORIZED);

        let rest_err = RestError::from(AuthError::RoleNotAccepted);
        assert_eq!(rest_err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_store_errors_are_typed() {
        let err = RestError::from_store(
            StoreError::Integrity("UNIQUE constraint failed".into()),
            json!([{"name": "dup"}]),
            "adding resource",
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.envelope(),
            json!({
                "error": true,
                "message": "Integrity Error",
                "data": [{"name": "dup"}],
                "operation": "adding resource"
            })
        );

        let err = RestError::from(StoreError::LockPoisoned);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_envelope_lists_fields() {
        let err = RestError::Validation(ValidationErrors::single("name", "Unknown field."));
        let body = err.envelope();
        assert_eq!(body["errors"], json!({"name": ["Unknown field."]}));
        assert_eq!(body["message"], "name: Unknown field.");
    }

    #[test]
    fn test_custom_status() {
        let err = RestError::Custom {
            data: Value::Null,
            message: "bad action".into(),
            operation: "applying relation".into(),
            status: 422,
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
