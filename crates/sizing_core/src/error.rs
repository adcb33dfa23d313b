//! Error types for the workflow core.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sizing_agents::AgentError;

use crate::fetcher::FetchFailure;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, WorkflowError>;

/// Errors that can end a breakdown run.
///
/// Agent failures and creation failures never appear here; they are recorded
/// in the run result instead.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Ticket fetch failed: {0}")]
    Fetch(#[from] FetchFailure),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Run was cancelled")]
    Cancelled,

    #[error("Agent registry error: {0}")]
    Registry(#[from] AgentError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run task failed: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowError {
    /// Machine-readable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Validation(_) => ErrorKind::ValidationError,
            WorkflowError::Fetch(_) => ErrorKind::FetchFailure,
            WorkflowError::Synthesis(_) => ErrorKind::SynthesisError,
            WorkflowError::Cancelled => ErrorKind::Cancelled,
            WorkflowError::Registry(_) => ErrorKind::RegistryError,
            WorkflowError::Config(_) => ErrorKind::ConfigError,
            WorkflowError::Internal(_) | WorkflowError::Io(_) => ErrorKind::InternalError,
        }
    }
}

/// Error category carried by terminal `failed` progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    FetchFailure,
    SynthesisError,
    Cancelled,
    RegistryError,
    ConfigError,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::FetchFailure => "fetch_failure",
            ErrorKind::SynthesisError => "synthesis_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::RegistryError => "registry_error",
            ErrorKind::ConfigError => "config_error",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            WorkflowError::Validation("empty".into()).kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(WorkflowError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            WorkflowError::from(FetchFailure::not_found("X-1")).kind(),
            ErrorKind::FetchFailure
        );
        assert_eq!(
            serde_json::to_value(ErrorKind::FetchFailure).unwrap(),
            "fetch_failure"
        );
    }
}
