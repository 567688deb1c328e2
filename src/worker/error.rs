//! Worker-specific error types.

use std::io;
use thiserror::Error;

use super::protocol::codes;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur during worker communication.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Failed to spawn the worker process.
    #[error("failed to spawn worker process: {0}")]
    SpawnFailed(#[source] io::Error),

    /// Failed to write to worker stdin.
    #[error("failed to write to worker: {0}")]
    WriteFailed(#[source] io::Error),

    /// Failed to serialize request to JSON.
    #[error("failed to serialize request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// Failed to deserialize response from JSON.
    #[error("failed to deserialize response: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// Request timed out waiting for response.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Worker process exited unexpectedly.
    #[error("worker process exited unexpectedly")]
    WorkerExited,

    /// Response channel was closed (internal error).
    #[error("response channel closed unexpectedly")]
    ChannelClosed,

    /// The warehouse reported a statement timeout.
    #[error("warehouse statement timed out: {0}")]
    StatementTimeout(String),

    /// The warehouse asked the client to slow down.
    #[error("warehouse throttled the request: {0}")]
    Throttled(String),

    /// The warehouse could not be reached.
    #[error("warehouse connection failed: {0}")]
    ConnectionFailed(String),

    /// The warehouse rejected the credentials.
    #[error("warehouse authentication failed: {0}")]
    AuthFailed(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Method not found.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Worker returned an error response, e.g. a SQL compilation error.
    #[error("worker error: {message} (code: {code})")]
    Remote {
        /// Error code from worker.
        code: String,
        /// Error message from worker.
        message: String,
    },
}

impl WorkerError {
    /// Create a remote error from an error response.
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Map an error response to a specific error.
    pub fn from_code(code: &str, message: &str) -> Self {
        match code {
            codes::TIMEOUT => Self::StatementTimeout(message.to_string()),
            codes::THROTTLED => Self::Throttled(message.to_string()),
            codes::CONNECTION_FAILED => Self::ConnectionFailed(message.to_string()),
            codes::AUTH_FAILED => Self::AuthFailed(message.to_string()),
            codes::INVALID_REQUEST => Self::InvalidRequest(message.to_string()),
            codes::METHOD_NOT_FOUND => Self::MethodNotFound(message.to_string()),
            codes::WORKER_EXITED => Self::WorkerExited,
            _ => Self::remote(code, message),
        }
    }

    /// Check if the session is unusable after this error.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::SpawnFailed(_)
                | Self::WriteFailed(_)
                | Self::WorkerExited
                | Self::ChannelClosed
                | Self::ConnectionFailed(_)
                | Self::AuthFailed(_)
        )
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for WorkerError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::ChannelClosed
    }
}
