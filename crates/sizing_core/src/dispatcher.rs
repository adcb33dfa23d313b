//! Concurrent agent dispatch.
//!
//! Every registered agent runs in its own spawned task with its own timeout.
//! Results are collected at a single fan-in point bounded by a global
//! deadline, so one slow or broken agent can never hold up or corrupt the
//! others.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::{AbortHandle, JoinError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sizing_agents::{AgentRegistry, AnalysisContext};
use sizing_model::{AgentErrorKind, AgentResult, AgentResults, Ticket};

use crate::config::WorkflowConfig;
use crate::error::{CoreResult, WorkflowError};
use crate::progress::{ProgressEvent, ProgressPublisher, ProgressStage};

/// Progress at the start of the analysis stage.
pub const ANALYSIS_START: u8 = 30;
/// Share of the progress bar covered by agent completions.
pub const ANALYSIS_SPAN: u8 = 40;

/// Progress value after `completed` of `total` agents have finished.
pub fn analysis_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return ANALYSIS_START + ANALYSIS_SPAN;
    }
    let completed = completed.min(total);
    ANALYSIS_START + (completed * ANALYSIS_SPAN as usize / total) as u8
}

/// Aborts every tracked task when dropped.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Runs every agent of a registry concurrently.
#[derive(Debug, Clone)]
pub struct AgentDispatcher {
    registry: Arc<AgentRegistry>,
    agent_timeout: Duration,
    deadline: Duration,
}

impl AgentDispatcher {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            agent_timeout: Duration::from_secs(120),
            deadline: Duration::from_secs(600),
        }
    }

    pub fn from_config(registry: Arc<AgentRegistry>, config: &WorkflowConfig) -> Self {
        Self::new(registry)
            .with_agent_timeout(config.agent_timeout())
            .with_deadline(config.analysis_deadline())
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Run all agents against `ticket` and return one result per agent.
    ///
    /// Emits an `agent_analysis` event per completion when a publisher is
    /// given. Only cancellation makes this return an error; every agent
    /// outcome, including panics and timeouts, is recorded in the mapping.
    pub async fn dispatch(
        &self,
        ticket: Arc<Ticket>,
        context: Arc<AnalysisContext>,
        progress: Option<&ProgressPublisher>,
        cancel: &CancellationToken,
    ) -> CoreResult<AgentResults> {
        let agents = self.registry.agents();
        let total = agents.len();
        let mut results = AgentResults::new();

        info!("Dispatching {} agent(s) for {}", total, ticket.id);
        self.emit(
            progress,
            0,
            total,
            "Starting multi-agent analysis".to_string(),
        );

        if total == 0 {
            return Ok(results);
        }

        let names: Vec<String> = agents.iter().map(|a| a.name().to_string()).collect();
        let mut guard = AbortOnDrop(Vec::with_capacity(total));
        let mut pending = FuturesUnordered::new();

        for agent in agents {
            let name = agent.name().to_string();
            let ticket = Arc::clone(&ticket);
            let context = Arc::clone(&context);
            let timeout = self.agent_timeout;

            let task_name = name.clone();
            let handle = tokio::spawn(async move {
                match tokio::time::timeout(timeout, agent.analyze(&ticket, &context)).await {
                    Ok(Ok(payload)) => AgentResult::success(task_name, payload),
                    Ok(Err(e)) => {
                        AgentResult::failure(task_name, AgentErrorKind::InvocationError, e.to_string())
                    }
                    Err(_) => AgentResult::timeout(
                        task_name,
                        format!("Agent did not respond within {}s", timeout.as_secs()),
                    ),
                }
            });

            guard.0.push(handle.abort_handle());
            pending.push(async move { (name, handle.await) });
        }

        let deadline = tokio::time::sleep(self.deadline);
        tokio::pin!(deadline);
        let mut completed = 0usize;

        while !pending.is_empty() {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    warn!("Analysis of {} cancelled with {} agent(s) in flight", ticket.id, pending.len());
                    return Err(WorkflowError::Cancelled);
                }

                _ = &mut deadline => {
                    warn!(
                        "Analysis deadline of {}s reached with {} agent(s) still running",
                        self.deadline.as_secs(),
                        pending.len()
                    );
                    for name in &names {
                        if results.contains(name) {
                            continue;
                        }
                        let result = AgentResult::timeout(
                            name.clone(),
                            format!("Analysis deadline of {}s reached", self.deadline.as_secs()),
                        );
                        completed += 1;
                        self.record(&mut results, result, completed, total, progress);
                    }
                    break;
                }

                Some((name, joined)) = pending.next() => {
                    let result = match joined {
                        Ok(result) => result,
                        Err(e) => join_failure(&name, e),
                    };
                    completed += 1;
                    self.record(&mut results, result, completed, total, progress);
                }
            }
        }

        drop(guard);
        info!(
            "Analysis finished: {} succeeded, {} failed",
            results.success_count(),
            results.failure_count()
        );
        Ok(results)
    }

    fn record(
        &self,
        results: &mut AgentResults,
        result: AgentResult,
        completed: usize,
        total: usize,
        progress: Option<&ProgressPublisher>,
    ) {
        let name = result.agent_name().to_string();
        let message = match result.error_kind() {
            None => {
                debug!("Agent {} succeeded", name);
                format!("Completed analysis: {}", name)
            }
            Some(kind) => {
                warn!("Agent {} failed ({})", name, kind);
                format!("Analysis failed ({}): {}", kind, name)
            }
        };

        if let Err(e) = results.record(result) {
            warn!("Dropping result: {}", e);
            return;
        }
        self.emit(progress, completed, total, message);
    }

    fn emit(&self, progress: Option<&ProgressPublisher>, completed: usize, total: usize, message: String) {
        let Some(publisher) = progress else {
            return;
        };
        let event = ProgressEvent::new(
            publisher.run_id(),
            ProgressStage::AgentAnalysis,
            analysis_progress(completed, total),
            message,
        )
        .with_agents(completed, total);

        if let Err(e) = publisher.publish_event(event) {
            warn!("Could not publish agent progress: {}", e);
        }
    }
}

fn join_failure(name: &str, error: JoinError) -> AgentResult {
    let message = if error.is_panic() {
        let panic = error.into_panic();
        let detail = panic
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| "unknown panic".to_string());
        format!("Agent panicked: {}", detail)
    } else {
        format!("Agent task ended unexpectedly: {}", error)
    };
    AgentResult::failure(name, AgentErrorKind::InvocationError, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sizing_agents::ScriptedAgent;

    fn registry(agents: Vec<ScriptedAgent>) -> Arc<AgentRegistry> {
        let mut registry = AgentRegistry::new();
        for agent in agents {
            registry.register(Arc::new(agent));
        }
        Arc::new(registry)
    }

    fn ticket() -> Arc<Ticket> {
        Arc::new(Ticket::new("RHOAIENG-669", "Model registry"))
    }

    #[test]
    fn test_analysis_progress_range() {
        assert_eq!(analysis_progress(0, 15), 30);
        assert_eq!(analysis_progress(15, 15), 70);
        assert_eq!(analysis_progress(1, 3), 43);
        assert_eq!(analysis_progress(0, 0), 70);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let dispatcher = AgentDispatcher::new(registry(vec![
            ScriptedAgent::succeeding("architect", json!({"analysis": "ok"})),
            ScriptedAgent::failing("qa", "model unavailable"),
            ScriptedAgent::panicking("uxd", "bad state"),
        ]));

        let results = dispatcher
            .dispatch(ticket(), Arc::new(AnalysisContext::new()), None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.get("architect").unwrap().is_success());
        assert_eq!(
            results.get("qa").unwrap().error_kind(),
            Some(AgentErrorKind::InvocationError)
        );
        match results.get("uxd").unwrap() {
            AgentResult::Failure { message, .. } => assert!(message.contains("bad state")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_agent_timeout() {
        let dispatcher = AgentDispatcher::new(registry(vec![
            ScriptedAgent::succeeding("fast", json!({})),
            ScriptedAgent::succeeding("slow", json!({})).with_delay(Duration::from_secs(300)),
        ]))
        .with_agent_timeout(Duration::from_secs(10));

        let results = dispatcher
            .dispatch(ticket(), Arc::new(AnalysisContext::new()), None, &CancellationToken::new())
            .await
            .unwrap();

        assert!(results.get("fast").unwrap().is_success());
        assert_eq!(
            results.get("slow").unwrap().error_kind(),
            Some(AgentErrorKind::Timeout)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_deadline() {
        let dispatcher = AgentDispatcher::new(registry(vec![
            ScriptedAgent::succeeding("fast", json!({})),
            ScriptedAgent::succeeding("slow", json!({})).with_delay(Duration::from_secs(100)),
        ]))
        .with_agent_timeout(Duration::from_secs(500))
        .with_deadline(Duration::from_secs(20));

        let publisher = ProgressPublisher::new("run-1");
        let results = dispatcher
            .dispatch(
                ticket(),
                Arc::new(AnalysisContext::new()),
                Some(&publisher),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(
            results.get("slow").unwrap().error_kind(),
            Some(AgentErrorKind::Timeout)
        );

        let events = publisher.log().events();
        let last = events.last().unwrap();
        assert_eq!(last.progress, 70);
        assert_eq!(last.completed_agents, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_follow_completion_order() {
        let dispatcher = AgentDispatcher::new(registry(vec![
            ScriptedAgent::succeeding("a_slow", json!({})).with_delay(Duration::from_secs(5)),
            ScriptedAgent::succeeding("z_fast", json!({})),
        ]));

        let publisher = ProgressPublisher::new("run-1");
        dispatcher
            .dispatch(
                ticket(),
                Arc::new(AnalysisContext::new()),
                Some(&publisher),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let messages: Vec<String> = publisher
            .log()
            .events()
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(
            messages,
            vec![
                "Starting multi-agent analysis",
                "Completed analysis: z_fast",
                "Completed analysis: a_slow",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let dispatcher = AgentDispatcher::new(Arc::new(AgentRegistry::new()));
        let results = dispatcher
            .dispatch(ticket(), Arc::new(AnalysisContext::new()), None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
