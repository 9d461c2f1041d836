//! Error types for the Convoy agent

use thiserror::Error;

/// Main error type for the Convoy agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// Malformed payload or a request the current state forbids (403)
    #[error("{0}")]
    Validation(String),

    /// Conflicting unique field, existing state untouched (409)
    #[error("{0}")]
    Conflict(String),

    /// The external credential-issuing facility failed (403, message forwarded)
    #[error("{0}")]
    Provisioning(String),

    #[error("{0}")]
    NotFound(String),

    /// A bounded identifier pool has no free entries left
    #[error("Allocation error: {0}")]
    Allocation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Server error: {0}")]
    Server(String),
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Server(err.to_string())
    }
}
