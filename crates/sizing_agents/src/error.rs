//! Error types for the agents crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for agent operations.
pub type AnalysisResult<T> = Result<T, AgentError>;

/// Errors that can occur while configuring or invoking agents.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Agent invocation failed: {agent} - {message}")]
    InvocationFailed { agent: String, message: String },

    #[error("Invalid agent configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid agent file {path:?}: {message}")]
    ConfigFile { path: PathBuf, message: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Create an invocation failed error.
    pub fn invocation_failed(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvocationFailed {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error for a specific file.
    pub fn config_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigFile {
            path: path.into(),
            message: message.into(),
        }
    }
}
