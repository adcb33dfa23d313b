//! Persona configuration and the deterministic persona analyst.
//!
//! A persona describes one reviewing perspective (staff engineer, UX
//! researcher, ...) through the keywords it looks for and the work it tends to
//! recommend. [`PersonaAgent`] turns that description into a payload without
//! any external calls, so runs are reproducible.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sizing_model::{Complexity, Priority, Theme, Ticket};

use crate::error::{AgentError, AnalysisResult};
use crate::payload::AnalysisPayload;
use crate::traits::{AnalysisAgent, AnalysisContext};

/// Persona definition, loadable from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Registry key (e.g. `STAFF_ENGINEER`)
    pub persona: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// What the persona is responsible for
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub theme: Option<Theme>,
    /// Keywords that signal work for this persona
    #[serde(default)]
    pub focus: Vec<String>,
    /// Components the persona usually touches
    #[serde(default)]
    pub components: Vec<String>,
    /// Standing recommendations
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl PersonaConfig {
    pub fn new(persona: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            name: name.into(),
            role: String::new(),
            theme: None,
            focus: Vec::new(),
            components: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn from_yaml_str(content: &str) -> AnalysisResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> AnalysisResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| AgentError::config_file(path, e.to_string()))
    }

    /// Display name, falling back to the persona key.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.persona
        } else {
            &self.name
        }
    }

    /// Theme, falling back to classification of the persona key.
    pub fn resolved_theme(&self) -> Theme {
        self.theme.unwrap_or_else(|| Theme::classify(&self.persona))
    }
}

/// Keyword-driven analyst for one persona.
pub struct PersonaAgent {
    config: PersonaConfig,
    description: String,
    focus_re: Option<Regex>,
    urgency_re: Regex,
}

impl PersonaAgent {
    pub fn new(config: PersonaConfig) -> AnalysisResult<Self> {
        if config.persona.trim().is_empty() {
            return Err(AgentError::InvalidConfig(
                "persona key cannot be empty".to_string(),
            ));
        }

        let keywords: Vec<String> = config
            .focus
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        let focus_re = if keywords.is_empty() {
            None
        } else {
            let pattern = format!(r"(?i)\b(?:{})\b", keywords.join("|"));
            Some(Regex::new(&pattern).map_err(|e| {
                AgentError::InvalidConfig(format!("{}: {}", config.persona, e))
            })?)
        };

        let urgency_re = Regex::new(r"(?i)\b(critical|blocker|outage|urgent|asap|deadline)\b")
            .map_err(|e| AgentError::InvalidConfig(e.to_string()))?;

        let description = if config.role.is_empty() {
            format!("{} analysis", config.display_name())
        } else {
            config.role.clone()
        };

        Ok(Self {
            config,
            description,
            focus_re,
            urgency_re,
        })
    }

    pub fn config(&self) -> &PersonaConfig {
        &self.config
    }

    /// Focus keywords found in `text`, in first-seen order, lowercased.
    fn matched_focus(&self, text: &str) -> Vec<String> {
        let Some(re) = &self.focus_re else {
            return Vec::new();
        };

        let mut seen = BTreeSet::new();
        re.find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|k| seen.insert(k.clone()))
            .collect()
    }

    fn urgency(&self, text: &str) -> Option<Priority> {
        let words: BTreeSet<String> = self
            .urgency_re
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect();

        if words.contains("critical") || words.contains("blocker") || words.contains("outage") {
            Some(Priority::Critical)
        } else if words.is_empty() {
            None
        } else {
            Some(Priority::High)
        }
    }

    fn estimate(matched: usize, ticket: &Ticket) -> Complexity {
        let mut signal = matched;
        if ticket.description.len() > 600 {
            signal += 1;
        }
        signal += ticket.related_items.len().min(2);

        match signal {
            0 => Complexity::Low,
            1..=2 => Complexity::Medium,
            _ => Complexity::High,
        }
    }
}

#[async_trait]
impl AnalysisAgent for PersonaAgent {
    fn name(&self) -> &str {
        &self.config.persona
    }

    fn theme(&self) -> Theme {
        self.config.resolved_theme()
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn analyze(
        &self,
        ticket: &Ticket,
        context: &AnalysisContext,
    ) -> AnalysisResult<serde_json::Value> {
        let text = context.feature_text(ticket);
        let matched = self.matched_focus(&text);
        debug!(
            "{} matched {} focus keyword(s) on {}",
            self.config.persona,
            matched.len(),
            ticket.id
        );

        let analysis = if matched.is_empty() {
            format!(
                "{} review of {}: no {} signals found; standard effort assumed.",
                self.config.display_name(),
                ticket.id,
                self.config.resolved_theme().label()
            )
        } else {
            format!(
                "{} review of {}: touches {}.",
                self.config.display_name(),
                ticket.id,
                matched.join(", ")
            )
        };

        let mut payload = AnalysisPayload::new(self.config.display_name(), analysis)
            .with_complexity(Self::estimate(matched.len(), ticket))
            .with_theme(self.config.resolved_theme());

        for keyword in &matched {
            payload = payload
                .with_concern(format!("Impact on {} needs assessment", keyword))
                .with_recommendation(format!("Cover {} changes with acceptance tests", keyword));
        }
        for recommendation in &self.config.recommendations {
            payload = payload.with_recommendation(recommendation.clone());
        }

        let components: BTreeSet<&String> = self
            .config
            .components
            .iter()
            .chain(ticket.components.iter())
            .collect();
        for component in components {
            payload = payload.with_component(component.clone());
        }

        if let Some(priority) = self.urgency(&text) {
            payload = payload.with_priority(priority);
        }

        Ok(payload.to_value())
    }
}

fn persona(
    key: &str,
    name: &str,
    role: &str,
    theme: Theme,
    focus: &[&str],
    components: &[&str],
    recommendations: &[&str],
) -> PersonaConfig {
    PersonaConfig {
        persona: key.to_string(),
        name: name.to_string(),
        role: role.to_string(),
        theme: Some(theme),
        focus: focus.iter().map(|s| s.to_string()).collect(),
        components: components.iter().map(|s| s.to_string()).collect(),
        recommendations: recommendations.iter().map(|s| s.to_string()).collect(),
    }
}

/// The built-in persona set.
pub fn builtin_personas() -> Vec<PersonaConfig> {
    vec![
        persona(
            "ENGINEERING_MANAGER",
            "Engineering Manager",
            "Team capacity, staffing and delivery risk",
            Theme::Delivery,
            &["capacity", "team", "deadline", "dependency", "roadmap"],
            &[],
            &["Confirm team capacity and sequencing before committing"],
        ),
        persona(
            "STAFF_ENGINEER",
            "Staff Engineer",
            "Technical feasibility and cross-cutting design",
            Theme::Architecture,
            &["api", "migration", "scalability", "integration", "versioning"],
            &["backend"],
            &["Write a technical design covering interfaces and migration"],
        ),
        persona(
            "architect",
            "Architect",
            "System boundaries and long-term architecture",
            Theme::Architecture,
            &["architecture", "service", "platform", "operator", "kubernetes"],
            &["platform"],
            &["Record an architecture decision for the new components"],
        ),
        persona(
            "backend_eng",
            "Backend Engineer",
            "Server-side implementation and data access",
            Theme::Architecture,
            &["api", "database", "storage", "endpoint", "registry"],
            &["backend"],
            &["Implement the server-side API with pagination and validation"],
        ),
        persona(
            "frontend_eng",
            "Frontend Engineer",
            "Client-side implementation",
            Theme::UserExperience,
            &["dashboard", "ui", "page", "form", "view"],
            &["frontend"],
            &["Build the UI views behind a feature flag"],
        ),
        persona(
            "SRE",
            "Site Reliability Engineer",
            "Operability, monitoring and rollout safety",
            Theme::Quality,
            &["monitoring", "deployment", "availability", "alerts", "upgrade"],
            &["observability"],
            &["Add dashboards and alerts for the new workload"],
        ),
        persona(
            "SECURITY_ENGINEER",
            "Security Engineer",
            "Threat modelling and access control",
            Theme::Quality,
            &["authentication", "authorization", "rbac", "secrets", "tls"],
            &["auth"],
            &["Run a threat model review and enforce RBAC"],
        ),
        persona(
            "DATA_ENGINEER",
            "Data/ML Engineer",
            "Model and data pipeline impact",
            Theme::Architecture,
            &["model", "pipeline", "training", "inference", "dataset"],
            &["ml-pipeline"],
            &["Define data contracts for model artifacts"],
        ),
        persona(
            "QA_ENGINEER",
            "QA Engineer",
            "Test strategy and regression risk",
            Theme::Quality,
            &["test", "regression", "upgrade", "compatibility", "performance"],
            &[],
            &["Add end-to-end tests covering the main user flow"],
        ),
        persona(
            "UX_RESEARCHER",
            "UX Researcher",
            "User needs and validation studies",
            Theme::UserExperience,
            &["user", "persona", "workflow", "feedback", "discoverability"],
            &[],
            &["Validate the workflow with target users"],
        ),
        persona(
            "UX_ARCHITECT",
            "UX Architect",
            "Information architecture and interaction patterns",
            Theme::UserExperience,
            &["navigation", "dashboard", "workflow", "wizard", "page"],
            &["frontend"],
            &["Define navigation and interaction patterns"],
        ),
        persona(
            "UX_FEATURE_LEAD",
            "UX Feature Lead",
            "End-to-end user experience of the feature",
            Theme::UserExperience,
            &["experience", "onboarding", "usability", "user", "empty state"],
            &[],
            &["Produce end-to-end UX flows for review"],
        ),
        persona(
            "uxd",
            "UX Designer",
            "Visual and interaction design",
            Theme::UserExperience,
            &["design", "layout", "accessibility", "form", "table"],
            &["frontend"],
            &["Deliver mockups that meet accessibility guidelines"],
        ),
        persona(
            "TECHNICAL_WRITER",
            "Technical Writer",
            "Documentation and release notes",
            Theme::Delivery,
            &["documentation", "docs", "guide", "release", "tutorial"],
            &["docs"],
            &["Document the feature and update release notes"],
        ),
        persona(
            "PRODUCT_MANAGER",
            "Product Manager",
            "Scope, value and acceptance",
            Theme::Delivery,
            &["customer", "requirement", "scope", "release", "roadmap"],
            &[],
            &["Agree on MVP scope and acceptance criteria with stakeholders"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> Ticket {
        Ticket::new("RHOAIENG-669", "Model registry")
            .with_description("Add a registry API and a dashboard page for model versions.")
    }

    #[test]
    fn test_builtin_personas() {
        let personas = builtin_personas();
        assert_eq!(personas.len(), 15);

        let keys: BTreeSet<&str> = personas.iter().map(|p| p.persona.as_str()).collect();
        assert_eq!(keys.len(), 15);

        for p in &personas {
            assert!(PersonaAgent::new(p.clone()).is_ok(), "{} failed", p.persona);
        }
    }

    #[test]
    fn test_empty_persona_rejected() {
        assert!(PersonaAgent::new(PersonaConfig::new("  ", "Nobody")).is_err());
    }

    #[test]
    fn test_yaml_config() {
        let config = PersonaConfig::from_yaml_str(
            "persona: CAPACITY\nname: Capacity Planner\ntheme: delivery\nfocus: [capacity]\n",
        )
        .unwrap();

        assert_eq!(config.persona, "CAPACITY");
        assert_eq!(config.resolved_theme(), Theme::Delivery);
        assert!(config.components.is_empty());
    }

    #[tokio::test]
    async fn test_analysis_is_deterministic() {
        let mut config = PersonaConfig::new("backend_eng", "Backend Engineer");
        config.focus = vec!["api".into(), "registry".into(), "queue".into()];
        config.components = vec!["backend".into()];
        let agent = PersonaAgent::new(config).unwrap();

        let context = AnalysisContext::new();
        let first = agent.analyze(&ticket(), &context).await.unwrap();
        let second = agent.analyze(&ticket(), &context).await.unwrap();
        assert_eq!(first, second);

        let payload = AnalysisPayload::from_value(&first).unwrap();
        assert_eq!(payload.concerns.len(), 2);
        assert_eq!(payload.required_components, vec!["backend".to_string()]);
        assert_eq!(payload.estimated_complexity, Complexity::Medium);
        assert_eq!(payload.priority(), None);
    }

    #[tokio::test]
    async fn test_urgency_sets_priority() {
        let agent = PersonaAgent::new(PersonaConfig::new("SRE", "SRE")).unwrap();
        let ticket = Ticket::new("OPS-1", "Fix outage in inference");

        let value = agent.analyze(&ticket, &AnalysisContext::new()).await.unwrap();
        let payload = AnalysisPayload::from_value(&value).unwrap();
        assert_eq!(payload.priority(), Some(Priority::Critical));
        assert_eq!(payload.estimated_complexity, Complexity::Low);
    }
}
