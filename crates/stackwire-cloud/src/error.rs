//! Cloud provider error types

use thiserror::Error;

/// Cloud provider errors
///
/// Provider rejections are surfaced verbatim to the operator. Creation calls
/// are not idempotent on the provider side, so nothing here is retried.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Container image not found in registry: {repository}:{tag}")]
    ImageNotFound { repository: String, tag: String },

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid resource request: {0}")]
    InvalidRequest(String),

    #[error("Resource {resource} did not report attribute '{attribute}'")]
    MissingAttribute { resource: String, attribute: String },

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
