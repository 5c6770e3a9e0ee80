//! Error types for the judge HTTP server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use judge_core::JudgeError;
use serde_json::json;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Transport-level failures. An execution that ran and failed is not one of
/// these; it is a normal `ExecutionResult` with a non-Accepted verdict.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed body, missing field or bad identifier
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Problem '{0}' not found")]
    ProblemNotFound(String),

    #[error("Session '{0}' not found")]
    SessionNotFound(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Judge error: {0}")]
    Judge(#[from] JudgeError),

    /// Server configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert ServerError to HTTP status code
impl ServerError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::Json(_) => 400,
            ServerError::ProblemNotFound(_) | ServerError::SessionNotFound(_) => 404,
            ServerError::Judge(e) if e.is_fatal() => 400,
            ServerError::Judge(_)
            | ServerError::Io(_)
            | ServerError::Config(_)
            | ServerError::Internal(_) => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::ProblemNotFound(_) => "problem_not_found",
            ServerError::SessionNotFound(_) => "session_not_found",
            ServerError::Json(_) => "json_error",
            ServerError::Io(_) => "io_error",
            ServerError::Judge(_) => "judge_error",
            ServerError::Config(_) => "config_error",
            ServerError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::debug!("Request rejected: {}", self);
        }
        let body = json!({
            "error": self.to_string(),
            "type": self.error_type(),
            "timestamp": chrono::Utc::now(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ServerError::invalid_request("x").status_code(), 400);
        assert_eq!(ServerError::ProblemNotFound("p".into()).status_code(), 404);
        assert_eq!(ServerError::internal("x").status_code(), 500);
        assert_eq!(
            ServerError::Judge(JudgeError::UnsupportedLanguage("cobol".into())).status_code(),
            400
        );
        assert_eq!(
            ServerError::Judge(JudgeError::IoError("disk".into())).status_code(),
            500
        );
    }
}
