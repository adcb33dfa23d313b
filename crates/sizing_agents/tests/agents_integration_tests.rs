//! Integration tests for agent configuration and analysis.

use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use sizing_agents::{
    AgentRegistry, AnalysisAgent, AnalysisContext, AnalysisPayload, ScriptedAgent,
};
use sizing_model::{Theme, Ticket};

/// Loading a directory picks up YAML personas and skips schema and bad files.
#[test]
fn test_load_personas_from_dir() {
    let temp = tempdir().unwrap();
    let dir = temp.path();

    fs::write(
        dir.join("staff_engineer.yaml"),
        "persona: STAFF_ENGINEER\nname: Staff Engineer\nfocus: [api, migration]\ncomponents: [backend]\n",
    )
    .unwrap();
    fs::write(
        dir.join("ux_researcher.yml"),
        "persona: UX_RESEARCHER\nname: UX Researcher\ntheme: user_experience\n",
    )
    .unwrap();
    fs::write(dir.join("agent-schema.yaml"), "type: object\n").unwrap();
    fs::write(dir.join("broken.yaml"), "persona: [unclosed\n").unwrap();
    fs::write(dir.join("nameless.yaml"), "persona: ''\n").unwrap();
    fs::write(dir.join("README.md"), "# agents\n").unwrap();

    let registry = AgentRegistry::load_from_dir(dir).unwrap();
    assert_eq!(registry.names(), vec!["STAFF_ENGINEER", "UX_RESEARCHER"]);

    let ux = registry.get_required("UX_RESEARCHER").unwrap();
    assert_eq!(ux.theme(), Theme::UserExperience);
}

/// A missing directory is a configuration error.
#[test]
fn test_load_missing_dir() {
    let temp = tempdir().unwrap();
    assert!(AgentRegistry::load_from_dir(&temp.path().join("nope")).is_err());
}

/// Built-in personas cover all four themes and analyze a realistic ticket.
#[tokio::test]
async fn test_builtin_personas_analyze_ticket() {
    let registry = AgentRegistry::builtin().unwrap();

    let themes: std::collections::BTreeSet<Theme> =
        registry.agents().iter().map(|a| a.theme()).collect();
    assert_eq!(themes.len(), 4);

    let ticket = Ticket::new("RHOAIENG-669", "Model registry for data science projects")
        .with_description(
            "Provide a model registry API with versioning, a dashboard page to browse \
             models, and documentation for users.",
        )
        .with_component("dashboard");
    let context = AnalysisContext::new().with_additional_context("Improve model deployment");

    for agent in registry.agents() {
        let value = agent.analyze(&ticket, &context).await.unwrap();
        let payload = AnalysisPayload::from_value(&value)
            .unwrap_or_else(|| panic!("{} produced an unreadable payload", agent.name()));
        assert!(!payload.analysis.is_empty());
        assert!(!payload.recommendations.is_empty(), "{}", agent.name());
        assert!(payload
            .required_components
            .contains(&"dashboard".to_string()));
    }
}

/// Registries mix persona and scripted agents behind the same contract.
#[tokio::test]
async fn test_registry_with_custom_agent() {
    let mut registry = AgentRegistry::builtin()
        .unwrap()
        .select(&["architect", "uxd"])
        .unwrap();
    registry.register(Arc::new(
        ScriptedAgent::with_recommendation("CAPACITY_PLANNER", "Reserve one sprint")
            .with_theme(Theme::Delivery),
    ));

    assert_eq!(registry.len(), 3);
    let planner = registry.get("CAPACITY_PLANNER").unwrap();
    assert_eq!(planner.theme(), Theme::Delivery);

    let value = planner
        .analyze(&Ticket::new("T-1", "Anything"), &AnalysisContext::new())
        .await
        .unwrap();
    assert_eq!(
        AnalysisPayload::from_value(&value).unwrap().recommendations,
        vec!["Reserve one sprint".to_string()]
    );
}
