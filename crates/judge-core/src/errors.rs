//! Error types for the execution engine
//!
//! Errors are split by where they originate. `SandboxError` covers everything
//! that goes wrong while talking to the container runtime, `JudgeError` covers
//! the engine's own failure modes. Neither ever reaches a caller of
//! `JudgeService::execute`: the orchestrator folds them into a typed verdict.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum JudgeError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("No harness template for language '{0}'")]
    MissingHarness(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Sandbox operation failed: {0}")]
    SandboxError(String),
    #[error("Session error: {0}")]
    SessionError(String),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl JudgeError {
    /// Fatal conditions are not worth retrying: the same request will fail
    /// the same way no matter how often it is sent.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            JudgeError::UnsupportedLanguage(_) | JudgeError::MissingHarness(_)
        )
    }
}

impl From<std::io::Error> for JudgeError {
    fn from(err: std::io::Error) -> Self {
        JudgeError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for JudgeError {
    fn from(err: serde_json::Error) -> Self {
        JudgeError::SerializationError(err.to_string())
    }
}

impl From<SandboxError> for JudgeError {
    fn from(err: SandboxError) -> Self {
        JudgeError::SandboxError(err.to_string())
    }
}

// Specific error for the container runtime
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Bollard (Docker client) error: {0}")]
    BollardError(#[from] bollard::errors::Error),
    #[error("Container '{0}' not found")]
    ContainerNotFound(String),
    #[error("Exec '{0}' did not attach to an output stream")]
    ExecDetached(String),
    #[error("Image '{image}' unavailable: {reason}")]
    ImageUnavailable { image: String, reason: String },
    #[error("I/O error during sandbox operation: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Sandbox runtime error: {0}")]
    Runtime(String),
}
