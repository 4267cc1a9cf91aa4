use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to connect tool source {source_name}: {reason}")]
    SessionConnect { source_name: String, reason: String },

    #[error("runtime session error: {0}")]
    Session(String),

    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("LLM call failed: {0}")]
    Llm(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("config error: {0}")]
    Config(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    pub(crate) fn connect(source_name: &str, reason: impl std::fmt::Display) -> Self {
        ServiceError::SessionConnect {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }
}
