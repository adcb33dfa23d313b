//! Breakdown workflow orchestration.
//!
//! A run moves through fetch, fan-out analysis, synthesis, optional item
//! creation, and assembly. Each run has a single coordinator task that owns
//! the progress publisher; callers observe it through a [`WorkflowRun`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use sizing_agents::{AgentRegistry, AnalysisContext};
use sizing_model::{Theme, Ticket};

use crate::assembler::{AssemblyInput, ResponseAssembler, WorkflowResult};
use crate::config::{FetchPolicy, WorkflowConfig};
use crate::creator::{CreationAdapter, ItemCreator};
use crate::dispatcher::AgentDispatcher;
use crate::error::{CoreResult, WorkflowError};
use crate::fetcher::{FetchAdapter, TicketFetcher};
use crate::progress::{ProgressEvent, ProgressLog, ProgressPublisher, ProgressStage, ProgressSubscriber};
use crate::synthesis::{summary_line, SynthesisEngine};

/// A request to break a ticket down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownRequest {
    #[serde(default, alias = "jira_id", alias = "ticket_id")]
    pub ticket_id: String,
    /// Extra context passed to every agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "user_id", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Write the breakdown to the tracker
    #[serde(default, alias = "create_jira_items", alias = "create_items")]
    pub create_items: bool,
}

impl BreakdownRequest {
    pub fn new(ticket_id: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_create_items(mut self, create: bool) -> Self {
        self.create_items = create;
        self
    }

    /// Parse a request given either as a JSON object or as a JSON string
    /// that itself encodes the object.
    pub fn from_json(input: &str) -> CoreResult<Self> {
        let value: Value = serde_json::from_str(input)
            .map_err(|e| WorkflowError::Validation(format!("request is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> CoreResult<Self> {
        let value = match value {
            Value::String(inner) => serde_json::from_str(&inner).map_err(|e| {
                WorkflowError::Validation(format!("request string is not valid JSON: {}", e))
            })?,
            other => other,
        };

        if !value.is_object() {
            return Err(WorkflowError::Validation(
                "request must be a JSON object".to_string(),
            ));
        }

        serde_json::from_value(value)
            .map_err(|e| WorkflowError::Validation(format!("invalid request: {}", e)))
    }

    /// Reject requests that cannot start a run.
    pub fn validate(&self) -> CoreResult<()> {
        if self.ticket_id.trim().is_empty() {
            return Err(WorkflowError::Validation("ticket id is required".to_string()));
        }
        Ok(())
    }
}

/// Entry point for breakdown runs.
pub struct BreakdownWorkflow {
    registry: Arc<AgentRegistry>,
    source: Arc<dyn TicketFetcher>,
    creator: Option<Arc<dyn ItemCreator>>,
    config: WorkflowConfig,
}

impl BreakdownWorkflow {
    pub fn new(registry: AgentRegistry, source: Arc<dyn TicketFetcher>) -> Self {
        Self {
            registry: Arc::new(registry),
            source,
            creator: None,
            config: WorkflowConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_creator(mut self, creator: Arc<dyn ItemCreator>) -> Self {
        self.creator = Some(creator);
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Validate the request and launch a run.
    ///
    /// Validation problems are returned here, before any progress event is
    /// emitted or any task is spawned. Must be called within a Tokio runtime.
    pub fn start(&self, request: BreakdownRequest) -> CoreResult<WorkflowRun> {
        request.validate()?;
        self.config.validate()?;

        if request.create_items && self.creator.is_none() {
            return Err(WorkflowError::Validation(
                "item creation requested but no item creator is configured".to_string(),
            ));
        }

        let registry = if self.config.enabled_agents.is_empty() {
            Arc::clone(&self.registry)
        } else {
            Arc::new(self.registry.select(&self.config.enabled_agents)?)
        };

        let run_id = Uuid::new_v4().to_string();
        let publisher = ProgressPublisher::new(run_id.clone());
        let log = publisher.log();
        let cancel = CancellationToken::new();

        let coordinator = RunCoordinator {
            run_id: run_id.clone(),
            request: BreakdownRequest {
                ticket_id: request.ticket_id.trim().to_string(),
                ..request
            },
            registry,
            fetcher: FetchAdapter::new(Arc::clone(&self.source))
                .with_timeout(self.config.fetch_timeout()),
            creator: self.creator.as_ref().map(|c| {
                CreationAdapter::new(Arc::clone(c)).with_timeout(self.config.create_timeout())
            }),
            config: self.config.clone(),
            publisher,
            cancel: cancel.clone(),
        };

        let handle = tokio::spawn(coordinator.execute());

        Ok(WorkflowRun {
            run_id,
            log,
            cancel,
            handle,
        })
    }

    /// Start a run and wait for its result.
    pub async fn run(&self, request: BreakdownRequest) -> CoreResult<WorkflowResult> {
        self.start(request)?.wait().await
    }
}

impl std::fmt::Debug for BreakdownWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakdownWorkflow")
            .field("registry", &self.registry)
            .field("source", &self.source.name())
            .field("creator", &self.creator.as_ref().map(|c| c.name().to_string()))
            .field("config", &self.config)
            .finish()
    }
}

/// Handle to a running breakdown.
#[derive(Debug)]
pub struct WorkflowRun {
    run_id: String,
    log: ProgressLog,
    cancel: CancellationToken,
    handle: JoinHandle<CoreResult<WorkflowResult>>,
}

impl WorkflowRun {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Progress events from the start of the run.
    pub fn subscribe(&self) -> ProgressSubscriber {
        self.log.subscribe()
    }

    pub fn progress_log(&self) -> ProgressLog {
        self.log.clone()
    }

    /// Request cancellation. In-flight agents are aborted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run, for wiring to signal handlers.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to end.
    pub async fn wait(self) -> CoreResult<WorkflowResult> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(WorkflowError::Internal(e.to_string())),
        }
    }
}

struct RunCoordinator {
    run_id: String,
    request: BreakdownRequest,
    registry: Arc<AgentRegistry>,
    fetcher: FetchAdapter,
    creator: Option<CreationAdapter>,
    config: WorkflowConfig,
    publisher: ProgressPublisher,
    cancel: CancellationToken,
}

impl RunCoordinator {
    #[instrument(skip(self), fields(run_id = %self.run_id, ticket = %self.request.ticket_id))]
    async fn execute(self) -> CoreResult<WorkflowResult> {
        let started = Instant::now();
        let ticket_id = self.request.ticket_id.clone();
        info!("Starting breakdown of {}", ticket_id);

        self.publish(
            ProgressStage::Received,
            0,
            format!("Breakdown request received for {}", ticket_id),
        );
        self.publish(
            ProgressStage::FetchingTicket,
            10,
            format!("Fetching details for {}", ticket_id),
        );

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(self.cancelled()),
            fetched = self.fetcher.fetch(&ticket_id) => fetched,
        };

        let (ticket, degraded) = match fetched {
            Ok(ticket) => (ticket, false),
            Err(failure) => match self.config.fetch_policy {
                FetchPolicy::Strict => {
                    let error = WorkflowError::from(failure);
                    self.fail(&error);
                    return Err(error);
                }
                FetchPolicy::Lenient => {
                    warn!("{}; continuing with a placeholder ticket", failure);
                    (Ticket::placeholder(ticket_id.clone()), true)
                }
            },
        };

        let fetched_message = if degraded {
            format!("Using placeholder details for {}", ticket_id)
        } else {
            format!("Successfully fetched {}", ticket_id)
        };
        self.publish(ProgressStage::FetchingTicket, 25, fetched_message);

        let ticket = Arc::new(ticket);
        let mut context = AnalysisContext::new().with_run_id(self.run_id.clone());
        if let Some(description) = &self.request.description {
            context = context.with_additional_context(description.clone());
        }
        if let Some(user) = &self.request.user_id {
            context = context.with_user(user.clone());
        }

        let dispatcher = AgentDispatcher::from_config(Arc::clone(&self.registry), &self.config);
        let agent_results = match dispatcher
            .dispatch(Arc::clone(&ticket), Arc::new(context), Some(&self.publisher), &self.cancel)
            .await
        {
            Ok(results) => results,
            Err(WorkflowError::Cancelled) => return Err(self.cancelled()),
            Err(error) => {
                self.fail(&error);
                return Err(error);
            }
        };

        if self.cancel.is_cancelled() {
            return Err(self.cancelled());
        }

        self.publish(
            ProgressStage::Synthesis,
            75,
            format!(
                "Synthesizing {} of {} analyses",
                agent_results.success_count(),
                agent_results.len()
            ),
        );

        let hints: HashMap<String, Theme> = self
            .registry
            .agents()
            .iter()
            .map(|a| (a.name().to_string(), a.theme()))
            .collect();
        let synthesis = match SynthesisEngine::from_config(&self.config).synthesize_with_themes(
            &ticket,
            &agent_results,
            &hints,
        ) {
            Ok(synthesis) => synthesis,
            Err(error) => {
                self.fail(&error);
                return Err(error);
            }
        };
        self.publish(
            ProgressStage::Synthesis,
            85,
            summary_line(&synthesis.breakdown),
        );

        let creation = match (&self.creator, self.request.create_items) {
            (Some(creator), true) => {
                let breakdown = &synthesis.breakdown;
                self.publish(
                    ProgressStage::ItemCreation,
                    90,
                    format!(
                        "Creating {} epic(s) and {} stories",
                        breakdown.epic_count(),
                        breakdown.story_count()
                    ),
                );
                let report = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(self.cancelled()),
                    report = creator.create(breakdown.epics(), breakdown.stories()) => report,
                };
                Some(report)
            }
            _ => None,
        };

        let result = ResponseAssembler::assemble(AssemblyInput {
            run_id: &self.run_id,
            requested_id: &ticket_id,
            ticket: &ticket,
            degraded,
            synthesis,
            agent_results,
            creation,
            elapsed: started.elapsed(),
        });

        info!(
            "Breakdown of {} completed in {:.2}s",
            ticket_id, result.processing_time_seconds
        );
        self.publish(
            ProgressStage::Completed,
            100,
            result
                .breakdown_summary
                .lines()
                .next()
                .unwrap_or_default()
                .to_string(),
        );

        Ok(result)
    }

    fn publish(&self, stage: ProgressStage, progress: u8, message: String) {
        if let Err(e) = self.publisher.publish(stage, progress, message) {
            warn!("Could not publish progress: {}", e);
        }
    }

    fn fail(&self, error: &WorkflowError) {
        warn!("Breakdown failed: {}", error);
        let event = ProgressEvent::new(
            &self.run_id,
            ProgressStage::Failed,
            0,
            error.to_string(),
        )
        .with_error(error.kind());
        if let Err(e) = self.publisher.publish_event(event) {
            warn!("Could not publish failure: {}", e);
        }
    }

    fn cancelled(&self) -> WorkflowError {
        let error = WorkflowError::Cancelled;
        self.fail(&error);
        error
    }
}
