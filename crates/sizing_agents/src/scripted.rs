//! Scripted agent for testing without real analysis.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use sizing_model::{Theme, Ticket};

use crate::error::{AgentError, AnalysisResult};
use crate::payload::AnalysisPayload;
use crate::traits::{AnalysisAgent, AnalysisContext};

/// What a scripted agent does when invoked.
#[derive(Debug, Clone)]
pub enum ScriptedBehavior {
    /// Return the payload
    Succeed(Value),
    /// Return an invocation error with the message
    Fail(String),
    /// Panic with the message
    Panic(String),
}

/// Agent with a fixed, preconfigured outcome.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    name: String,
    theme: Option<Theme>,
    behavior: ScriptedBehavior,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl ScriptedAgent {
    fn with_behavior(name: impl Into<String>, behavior: ScriptedBehavior) -> Self {
        Self {
            name: name.into(),
            theme: None,
            behavior,
            delay: None,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Agent that returns `payload`.
    pub fn succeeding(name: impl Into<String>, payload: Value) -> Self {
        Self::with_behavior(name, ScriptedBehavior::Succeed(payload))
    }

    /// Agent that returns a small well-formed payload naming itself.
    pub fn with_recommendation(name: impl Into<String>, recommendation: impl Into<String>) -> Self {
        let name = name.into();
        let payload = AnalysisPayload::new(name.clone(), format!("{} analysis", name))
            .with_recommendation(recommendation)
            .to_value();
        Self::succeeding(name, payload)
    }

    /// Agent that returns an error.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_behavior(name, ScriptedBehavior::Fail(message.into()))
    }

    /// Agent that panics.
    pub fn panicking(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_behavior(name, ScriptedBehavior::Panic(message.into()))
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = Some(theme);
        self
    }

    /// Ticket ids this agent has been invoked with, including unfinished calls.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().clone()
    }
}

#[async_trait]
impl AnalysisAgent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn theme(&self) -> Theme {
        self.theme.unwrap_or_else(|| Theme::classify(&self.name))
    }

    fn description(&self) -> &str {
        "Scripted agent"
    }

    async fn analyze(
        &self,
        ticket: &Ticket,
        _context: &AnalysisContext,
    ) -> AnalysisResult<Value> {
        self.calls.write().push(ticket.id.clone());

        if let Some(delay) = self.delay {
            debug!("{} sleeping {:?}", self.name, delay);
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            ScriptedBehavior::Succeed(payload) => Ok(payload.clone()),
            ScriptedBehavior::Fail(message) => {
                Err(AgentError::invocation_failed(&self.name, message.clone()))
            }
            ScriptedBehavior::Panic(message) => panic!("{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_success_records_call() {
        let agent = ScriptedAgent::succeeding("qa", json!({"analysis": "ok"}));
        let ticket = Ticket::new("T-1", "Ticket");

        let value = agent.analyze(&ticket, &AnalysisContext::new()).await.unwrap();
        assert_eq!(value["analysis"], "ok");
        assert_eq!(agent.calls(), vec!["T-1".to_string()]);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let agent = ScriptedAgent::failing("qa", "model unavailable");
        let ticket = Ticket::new("T-1", "Ticket");

        let err = agent
            .analyze(&ticket, &AnalysisContext::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_delay() {
        let agent = ScriptedAgent::with_recommendation("qa", "Add tests")
            .with_delay(Duration::from_secs(30));
        let ticket = Ticket::new("T-1", "Ticket");

        let started = tokio::time::Instant::now();
        agent.analyze(&ticket, &AnalysisContext::new()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(30));
    }
}
