//! Workflow configuration.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoreResult, WorkflowError};

/// What to do when the ticket cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPolicy {
    /// End the run with a `failed` event
    #[default]
    Strict,
    /// Warn and continue with a placeholder ticket
    Lenient,
}

impl fmt::Display for FetchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPolicy::Strict => write!(f, "strict"),
            FetchPolicy::Lenient => write!(f, "lenient"),
        }
    }
}

impl FromStr for FetchPolicy {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(FetchPolicy::Strict),
            "lenient" | "degraded" => Ok(FetchPolicy::Lenient),
            other => Err(WorkflowError::Config(format!("unknown fetch policy '{}'", other))),
        }
    }
}

/// Tunables for one breakdown workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Per-agent timeout
    pub agent_timeout_seconds: u64,
    /// Ceiling for the whole analysis stage
    pub analysis_deadline_seconds: u64,
    pub fetch_timeout_seconds: u64,
    pub create_timeout_seconds: u64,
    pub fetch_policy: FetchPolicy,
    /// Agents to run (empty = every registered agent)
    pub enabled_agents: Vec<String>,
    pub max_stories_per_epic: usize,
    pub max_story_points: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            agent_timeout_seconds: 120,
            analysis_deadline_seconds: 600,
            fetch_timeout_seconds: 30,
            create_timeout_seconds: 120,
            fetch_policy: FetchPolicy::Strict,
            enabled_agents: Vec::new(),
            max_stories_per_epic: 6,
            max_story_points: 13,
        }
    }
}

impl WorkflowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| WorkflowError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Defaults overridden by `SIZING_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `SIZING_*` overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let seconds = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring {}={}: not a number of seconds", key, raw);
                    None
                }
            }
        };

        if let Some(value) = seconds("SIZING_AGENT_TIMEOUT") {
            self.agent_timeout_seconds = value;
        }
        if let Some(value) = seconds("SIZING_ANALYSIS_DEADLINE") {
            self.analysis_deadline_seconds = value;
        }
        if let Some(value) = seconds("SIZING_FETCH_TIMEOUT") {
            self.fetch_timeout_seconds = value;
        }
        if let Some(value) = seconds("SIZING_CREATE_TIMEOUT") {
            self.create_timeout_seconds = value;
        }

        if let Some(policy) = lookup("SIZING_FETCH_POLICY") {
            match policy.parse() {
                Ok(policy) => self.fetch_policy = policy,
                Err(e) => warn!("Ignoring SIZING_FETCH_POLICY: {}", e),
            }
        }

        if let Some(agents) = lookup("SIZING_AGENTS") {
            self.enabled_agents = agents
                .split(',')
                .map(|a| a.trim())
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect();
        }

        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout_seconds = whole_seconds(timeout);
        self
    }

    pub fn with_analysis_deadline(mut self, deadline: Duration) -> Self {
        self.analysis_deadline_seconds = whole_seconds(deadline);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_seconds = whole_seconds(timeout);
        self
    }

    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout_seconds = whole_seconds(timeout);
        self
    }

    pub fn with_fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = policy;
        self
    }

    pub fn with_enabled_agents(mut self, agents: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enabled_agents = agents.into_iter().map(Into::into).collect();
        self
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_seconds)
    }

    pub fn analysis_deadline(&self) -> Duration {
        Duration::from_secs(self.analysis_deadline_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.create_timeout_seconds)
    }

    /// Reject settings that would make every run fail.
    pub fn validate(&self) -> CoreResult<()> {
        if self.agent_timeout_seconds == 0 {
            return Err(WorkflowError::Config("agent_timeout_seconds must be > 0".into()));
        }
        if self.analysis_deadline_seconds == 0 {
            return Err(WorkflowError::Config(
                "analysis_deadline_seconds must be > 0".into(),
            ));
        }
        if self.fetch_timeout_seconds == 0 {
            return Err(WorkflowError::Config("fetch_timeout_seconds must be > 0".into()));
        }
        if self.create_timeout_seconds == 0 {
            return Err(WorkflowError::Config("create_timeout_seconds must be > 0".into()));
        }
        if self.max_story_points == 0 {
            return Err(WorkflowError::Config("max_story_points must be > 0".into()));
        }
        Ok(())
    }
}

/// Seconds in `duration`, rounded up so sub-second values never become zero.
fn whole_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.agent_timeout(), Duration::from_secs(120));
        assert_eq!(config.fetch_policy, FetchPolicy::Strict);
        assert!(config.enabled_agents.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SIZING_AGENT_TIMEOUT", "5"),
            ("SIZING_FETCH_TIMEOUT", "soon"),
            ("SIZING_FETCH_POLICY", "lenient"),
            ("SIZING_AGENTS", "architect, uxd,,SRE"),
        ]
        .into_iter()
        .collect();

        let config = WorkflowConfig::default()
            .with_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.agent_timeout_seconds, 5);
        assert_eq!(config.fetch_timeout_seconds, 30);
        assert_eq!(config.fetch_policy, FetchPolicy::Lenient);
        assert_eq!(config.enabled_agents, vec!["architect", "uxd", "SRE"]);
    }

    #[test]
    fn test_from_toml_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("sizing.toml");
        std::fs::write(
            &path,
            "agent_timeout_seconds = 45\nfetch_policy = \"lenient\"\nmax_stories_per_epic = 3\n",
        )
        .unwrap();

        let config = WorkflowConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.agent_timeout_seconds, 45);
        assert_eq!(config.fetch_policy, FetchPolicy::Lenient);
        assert_eq!(config.max_stories_per_epic, 3);
        assert_eq!(config.max_story_points, 13);
    }

    #[test]
    fn test_invalid_config() {
        let config = WorkflowConfig {
            max_story_points: 0,
            ..WorkflowConfig::default()
        };
        assert!(config.validate().is_err());
        assert!("sometimes".parse::<FetchPolicy>().is_err());

        let config = WorkflowConfig {
            fetch_timeout_seconds: 0,
            ..WorkflowConfig::default()
        };
        assert!(config.validate().is_err());

        let config = WorkflowConfig {
            create_timeout_seconds: 0,
            ..WorkflowConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_setters_round_up() {
        let config = WorkflowConfig::default()
            .with_agent_timeout(Duration::from_millis(500))
            .with_analysis_deadline(Duration::from_millis(1900))
            .with_fetch_timeout(Duration::from_secs(7))
            .with_create_timeout(Duration::from_nanos(1));

        assert_eq!(config.agent_timeout(), Duration::from_secs(1));
        assert_eq!(config.analysis_deadline(), Duration::from_secs(2));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(7));
        assert_eq!(config.create_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }
}
