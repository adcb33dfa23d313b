//! Structured view over an agent's analysis payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sizing_model::{Complexity, Priority, Theme};

/// Assessment produced by one agent.
///
/// Every field is defaulted so partial payloads still parse. Priority and
/// theme stay as text and are interpreted on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisPayload {
    pub analysis: String,
    pub persona: String,
    pub estimated_complexity: Complexity,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
    pub required_components: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl AnalysisPayload {
    pub fn new(persona: impl Into<String>, analysis: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            analysis: analysis.into(),
            ..Self::default()
        }
    }

    /// Read a payload, treating anything unreadable as absent.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.estimated_complexity = complexity;
        self
    }

    pub fn with_concern(mut self, concern: impl Into<String>) -> Self {
        self.concerns.push(concern.into());
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.required_components.push(component.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority.as_str().to_string());
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = Some(theme.as_str().to_string());
        self
    }

    /// Signalled priority, if present and recognizable.
    pub fn priority(&self) -> Option<Priority> {
        self.priority.as_deref().and_then(|p| p.parse().ok())
    }

    /// Explicit theme, if present and recognizable.
    pub fn theme(&self) -> Option<Theme> {
        self.theme.as_deref().and_then(|t| t.parse().ok())
    }
}
