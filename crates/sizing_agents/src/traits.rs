//! Core agent trait and invocation context.
//!
//! Every analysis capability implements [`AnalysisAgent`]. Agents are opaque to
//! the workflow: they take a ticket plus context and return a JSON payload that
//! the synthesis stage reads leniently.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sizing_model::{Theme, Ticket};

use crate::error::AnalysisResult;

/// Per-run context handed to every agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    /// Identifier of the run the invocation belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Free-form context supplied by the requester
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    /// Requesting user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_additional_context(mut self, context: impl Into<String>) -> Self {
        self.additional_context = Some(context.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Text an agent should analyze for `ticket`.
    pub fn feature_text(&self, ticket: &Ticket) -> String {
        ticket.feature_description(self.additional_context.as_deref())
    }
}

/// Trait implemented by all analysis agents.
#[async_trait]
pub trait AnalysisAgent: Send + Sync {
    /// Unique name the agent is registered under.
    fn name(&self) -> &str;

    /// Thematic concern the agent contributes to.
    fn theme(&self) -> Theme {
        Theme::classify(self.name())
    }

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Analyze a ticket and return the raw analysis payload.
    async fn analyze(
        &self,
        ticket: &Ticket,
        context: &AnalysisContext,
    ) -> AnalysisResult<serde_json::Value>;
}
