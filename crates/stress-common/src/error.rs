//! Error types for kube-stress.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using StressError.
pub type StressResult<T> = Result<T, StressError>;

/// Errors that abort a run before any request is issued, or that surface from
/// collaborators outside the request path.
#[derive(Debug, Error)]
pub enum StressError {
    // === Configuration Errors ===
    #[error("Invalid value for '{field}': {message}")]
    InvalidConfig {
        field: &'static str,
        message: String,
    },

    #[error("Client pool must contain at least one client")]
    EmptyClientPool,

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(String),

    #[error("Failed to build API client: {0}")]
    ClientBuild(String),

    // === Output Errors ===
    #[error("Result sink error: {0}")]
    Sink(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StressError {
    /// Shorthand for an [`StressError::InvalidConfig`] error.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        StressError::InvalidConfig {
            field,
            message: message.into(),
        }
    }

    /// Whether this error was caused by the supplied configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            StressError::InvalidConfig { .. }
                | StressError::EmptyClientPool
                | StressError::Kubeconfig(_)
        )
    }
}

/// Failure of a single list request.
///
/// These never leave the request worker; they are counted and logged.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,

    #[error("failed to read response body: {0}")]
    Body(String),
}

impl RequestError {
    /// Short label for structured logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Transport(_) => "transport",
            RequestError::Status { .. } => "status",
            RequestError::Timeout(_) => "timeout",
            RequestError::Cancelled => "cancelled",
            RequestError::Body(_) => "body",
        }
    }
}
