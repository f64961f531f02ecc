//! Error types for the execution engine.

use std::path::PathBuf;
use std::time::Duration;

use crate::types::ErrorKind;

/// Errors that can occur while executing a snippet.
///
/// Only [`EngineError::Workspace`] and [`EngineError::InvalidIdentity`] are
/// returned from [`crate::engine::Engine::execute`]; every other variant is
/// folded into the result's `runtime_error` field so the caller always gets a
/// well-formed [`crate::types::ExecutionResult`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Workspace directory could not be created or written.
    #[error("workspace error at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Caller identity is not usable as a path component.
    #[error("invalid identity {identity:?}: {reason}")]
    InvalidIdentity { identity: String, reason: String },

    /// Docker daemon is not available or not running.
    #[error("Docker not available: {reason}")]
    DockerNotAvailable { reason: String },

    /// Failed to create container.
    #[error("container creation failed: {reason}")]
    ContainerCreationFailed { reason: String },

    /// Failed to start container.
    #[error("container start failed: {reason}")]
    ContainerStartFailed { reason: String },

    /// Execution failed inside the container.
    #[error("execution failed: {reason}")]
    ExecutionFailed { reason: String },

    /// Execution exceeded the configured deadline.
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// Docker API error.
    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Classify this error for the caller's UI.
    ///
    /// Infrastructure failures (daemon unreachable, image missing) render
    /// differently from failures of the executed code itself.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Timeout(_) => ErrorKind::Timeout,
            _ => ErrorKind::Infrastructure,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
