//! Error types for the content store client.

use crate::types::ContentRef;
use std::time::Duration;
use thiserror::Error;

/// Coarse failure class, used by callers to pick a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NetworkFailure,
    MalformedResponse,
    Timeout,
    PartialFailure,
    Superseded,
    NotFound,
    Config,
    Io,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport error, or the node answered with a non-success status
    #[error("Network failure at {node}: {message}")]
    NetworkFailure { node: String, message: String },

    /// Response did not parse or did not have the expected shape
    #[error("Malformed response from {node}: {message}")]
    MalformedResponse { node: String, message: String },

    #[error("Operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Content was written but the owning record does not point at it yet
    #[error("Content for record {record_id} was written to {new_ref} but the record pointer was not saved: {message}")]
    PartialFailure {
        record_id: String,
        new_ref: ContentRef,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Call superseded by a later call on the same stream")]
    Superseded,

    /// The placeholder was removed while its upload ran; the upload was deleted again
    #[error("Attachment {file_id} was removed before its upload finished")]
    AttachmentAbandoned { file_id: String },

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn network(node: impl Into<String>, message: impl ToString) -> Self {
        ApiError::NetworkFailure {
            node: node.into(),
            message: message.to_string(),
        }
    }

    pub fn malformed(node: impl Into<String>, message: impl ToString) -> Self {
        ApiError::MalformedResponse {
            node: node.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::NetworkFailure { .. } => ErrorKind::NetworkFailure,
            ApiError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            ApiError::Timeout(_) => ErrorKind::Timeout,
            ApiError::PartialFailure { .. } => ErrorKind::PartialFailure,
            ApiError::Serialization(_) => ErrorKind::MalformedResponse,
            ApiError::Superseded | ApiError::AttachmentAbandoned { .. } => ErrorKind::Superseded,
            ApiError::RecordNotFound(_) => ErrorKind::NotFound,
            ApiError::ConfigError(_) => ErrorKind::Config,
            ApiError::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NetworkFailure | ErrorKind::Timeout | ErrorKind::PartialFailure
        )
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
