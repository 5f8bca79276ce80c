//! # API Errors
//!
//! The client-facing error taxonomy and its HTTP mapping. Store failures
//! stay generic on the wire (full detail is logged server-side with a
//! correlating id); the debug flag attaches the detail to the body for
//! development deployments.

use std::sync::OnceLock;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::observability::{Logger, Severity};
use crate::store::StoreError;
use crate::validate::ValidationError;

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Gateway errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client-caused: missing/empty/invalid fields. Always names them.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Missing or incorrect credentials. Deliberately generic.
    #[error("Unauthorized")]
    Auth,

    /// The request exceeded its deadline.
    #[error("Request timed out")]
    Timeout,

    /// Any failure from the external store, including transaction aborts.
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth => StatusCode::UNAUTHORIZED,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::Auth => "AuthError",
            ApiError::Timeout => "TimeoutError",
            ApiError::Store(_) => "StoreError",
        }
    }
}

/// Error response body: `{error}` plus optional debug detail.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

/// Server-side detail attached to error bodies when the debug flag is set.
#[derive(Debug, Serialize)]
pub struct DebugInfo {
    pub message: String,
    pub stack: String,
    pub name: String,
    pub timestamp: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
}

static DEBUG_ERRORS: OnceLock<bool> = OnceLock::new();

/// Enable or disable debug detail on error bodies. Called once at startup;
/// later calls are ignored.
pub fn set_debug_errors(enabled: bool) {
    let _ = DEBUG_ERRORS.set(enabled);
}

fn debug_errors() -> bool {
    DEBUG_ERRORS.get().copied().unwrap_or(false)
}

/// Walk the source chain into one printable trail.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain.join(" <- ")
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Server-side failures get a correlating id that appears in both
        // the log line and the debug payload, and a generic wire message.
        let (error, debug) = if status.is_server_error() {
            let error_id = Uuid::new_v4().to_string();
            Logger::log(
                Severity::Error,
                "request_failed",
                &[
                    ("error", error_chain(&self)),
                    ("error_id", error_id.clone()),
                    ("name", self.name().to_string()),
                    ("status", status.as_u16().to_string()),
                ],
            );
            let debug = debug_errors().then(|| DebugInfo {
                message: self.to_string(),
                stack: error_chain(&self),
                name: self.name().to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                request_id: error_id,
            });
            ("Internal server error".to_string(), debug)
        } else {
            (self.to_string(), None)
        };

        (status, Json(ErrorResponse { error, debug })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Validation(ValidationError::new("bad")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Auth.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Timeout.status_code(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            ApiError::Store(StoreError::Operation("down".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = ApiError::Validation(ValidationError::new("Missing required field: collection"));
        assert_eq!(err.to_string(), "Missing required field: collection");
    }

    #[test]
    fn test_auth_message_is_generic() {
        assert_eq!(ApiError::Auth.to_string(), "Unauthorized");
    }
}
