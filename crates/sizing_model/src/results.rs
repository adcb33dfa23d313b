//! Per-agent outcomes of the analysis stage.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Why an agent produced no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentErrorKind {
    /// The agent did not answer within its timeout or the run deadline
    Timeout,
    /// The agent returned an error or panicked
    InvocationError,
}

impl fmt::Display for AgentErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentErrorKind::Timeout => write!(f, "timeout"),
            AgentErrorKind::InvocationError => write!(f, "invocation_error"),
        }
    }
}

/// Outcome of one agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentResult {
    #[serde(rename_all = "camelCase")]
    Success {
        agent_name: String,
        analysis_payload: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    Failure {
        agent_name: String,
        error_kind: AgentErrorKind,
        message: String,
    },
}

impl AgentResult {
    pub fn success(agent_name: impl Into<String>, payload: serde_json::Value) -> Self {
        AgentResult::Success {
            agent_name: agent_name.into(),
            analysis_payload: payload,
        }
    }

    pub fn failure(
        agent_name: impl Into<String>,
        error_kind: AgentErrorKind,
        message: impl Into<String>,
    ) -> Self {
        AgentResult::Failure {
            agent_name: agent_name.into(),
            error_kind,
            message: message.into(),
        }
    }

    pub fn timeout(agent_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::failure(agent_name, AgentErrorKind::Timeout, message)
    }

    pub fn agent_name(&self) -> &str {
        match self {
            AgentResult::Success { agent_name, .. } | AgentResult::Failure { agent_name, .. } => {
                agent_name
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AgentResult::Success { .. })
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            AgentResult::Success {
                analysis_payload, ..
            } => Some(analysis_payload),
            AgentResult::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<AgentErrorKind> {
        match self {
            AgentResult::Failure { error_kind, .. } => Some(*error_kind),
            AgentResult::Success { .. } => None,
        }
    }
}

/// Mapping from agent name to its outcome.
///
/// Each slot is written once; a second write for the same agent is refused
/// and the first value is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentResults {
    entries: BTreeMap<String, AgentResult>,
}

impl AgentResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome for the agent named in `result`.
    pub fn record(&mut self, result: AgentResult) -> ModelResult<()> {
        let name = result.agent_name().to_string();
        if self.entries.contains_key(&name) {
            return Err(ModelError::DuplicateAgentResult(name));
        }
        self.entries.insert(name, result);
        Ok(())
    }

    pub fn get(&self, agent_name: &str) -> Option<&AgentResult> {
        self.entries.get(agent_name)
    }

    pub fn contains(&self, agent_name: &str) -> bool {
        self.entries.contains_key(agent_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in agent name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AgentResult)> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn successes(&self) -> impl Iterator<Item = &AgentResult> {
        self.entries.values().filter(|r| r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &AgentResult> {
        self.entries.values().filter(|r| !r.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}

impl IntoIterator for AgentResults {
    type Item = (String, AgentResult);
    type IntoIter = std::collections::btree_map::IntoIter<String, AgentResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
