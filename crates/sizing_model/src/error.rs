//! Error types for the model crate.

use thiserror::Error;

/// Result type alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while building or parsing model values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid breakdown: {0}")]
    InvalidBreakdown(String),

    #[error("Result for agent '{0}' was already recorded")]
    DuplicateAgentResult(String),

    #[error("Unknown priority: {0}")]
    UnknownPriority(String),

    #[error("Unknown theme: {0}")]
    UnknownTheme(String),
}
