//! Integration tests for the sizing data model.

use std::fs;
use tempfile::tempdir;

use sizing_model::{
    AgentResult, AgentResults, Breakdown, BreakdownValidator, Complexity, Priority, Theme, Ticket,
    WorkItem,
};

fn sample_breakdown() -> Breakdown {
    let arch = WorkItem::epic("Platform & Architecture: Model registry", "Backend work")
        .with_criterion("Registry API is versioned")
        .with_component("backend");
    let ux = WorkItem::epic("User Experience: Model registry", "UI work")
        .with_criterion("Registry page is accessible")
        .with_component("frontend");

    let stories = vec![
        WorkItem::story("Design registry schema", "Schema", arch.title.clone())
            .with_points(5)
            .with_priority(Priority::High)
            .with_criterion("Schema reviewed"),
        WorkItem::story("Expose versions endpoint", "API", arch.title.clone())
            .with_points(3)
            .with_criterion("Endpoint documented"),
        WorkItem::story("Registry list view", "UI", ux.title.clone())
            .with_points(8)
            .with_criterion("List paginates"),
    ];

    Breakdown::new(vec![arch, ux], stories).unwrap()
}

/// Breakdown loaded from a JSON file keeps its links and totals.
#[test]
fn test_breakdown_from_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("breakdown.json");

    let breakdown = sample_breakdown();
    fs::write(&path, serde_json::to_string_pretty(&breakdown).unwrap()).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let loaded: Breakdown = serde_json::from_str(&content).unwrap();

    assert_eq!(loaded.epic_count(), 2);
    assert_eq!(loaded.story_count(), 3);
    assert_eq!(loaded.total_points(), 16);
    assert_eq!(
        loaded
            .stories_for("Platform & Architecture: Model registry")
            .count(),
        2
    );
}

/// A hand-edited file with a dangling parent is refused on load.
#[test]
fn test_breakdown_file_with_dangling_parent() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("broken.json");

    fs::write(
        &path,
        r#"{
            "epics": [{"itemType": "epic", "title": "Epic", "description": "d"}],
            "stories": [{"itemType": "story", "title": "S", "description": "d", "parentEpic": "Other"}]
        }"#,
    )
    .unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let err = serde_json::from_str::<Breakdown>(&content).unwrap_err();
    assert!(err.to_string().contains("unknown epic"));
}

/// Validation of a well-formed breakdown reports no errors or warnings.
#[test]
fn test_sample_breakdown_is_clean() {
    let result = BreakdownValidator::validate(&sample_breakdown());
    assert!(result.valid, "Validation failed: {:?}", result.errors);
    assert!(result.warnings.is_empty(), "Warnings: {:?}", result.warnings);
}

/// Ticket payloads from the tracker accept snake_case aliases and defaults.
#[test]
fn test_ticket_from_tracker_json() {
    let ticket: Ticket = serde_json::from_str(
        r#"{
            "id": "RHOAIENG-669",
            "summary": "Model registry",
            "related_items": ["RHOAIENG-100", "RHOAIENG-101"],
            "issue_type": "Feature",
            "labels": ["ai"]
        }"#,
    )
    .unwrap();

    assert_eq!(ticket.status, "Open");
    assert_eq!(ticket.related_items.len(), 2);
    assert_eq!(ticket.issue_type.as_deref(), Some("Feature"));
    assert_eq!(ticket.project_key(), "RHOAIENG");
}

/// Agent results keyed by name serialize as a plain object.
#[test]
fn test_agent_results_as_object() {
    let mut results = AgentResults::new();
    results
        .record(AgentResult::success(
            "UX_ARCHITECT",
            serde_json::json!({"estimatedComplexity": "HIGH"}),
        ))
        .unwrap();
    results
        .record(AgentResult::timeout("SRE", "no answer"))
        .unwrap();

    let json = serde_json::to_value(&results).unwrap();
    assert!(json.is_object());
    assert_eq!(json["SRE"]["errorKind"], "timeout");

    let complexity: Complexity = serde_json::from_value(
        json["UX_ARCHITECT"]["analysisPayload"]["estimatedComplexity"].clone(),
    )
    .unwrap();
    assert_eq!(complexity, Complexity::High);
    assert_eq!(Theme::classify("UX_ARCHITECT"), Theme::UserExperience);
}
