//! Data models for tickets, work items, and breakdowns.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::validator::BreakdownValidator;

fn default_status() -> String {
    "Open".to_string()
}

/// A feature ticket as returned by the tracking system.
///
/// Tickets are immutable once fetched; every stage of a run reads the same
/// value through an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// External identifier (e.g. `RHOAIENG-669`)
    pub id: String,
    /// One-line summary
    pub summary: String,
    /// Long-form description
    #[serde(default)]
    pub description: String,
    /// Workflow status in the tracking system
    #[serde(default = "default_status")]
    pub status: String,
    /// References to related tickets (unordered)
    #[serde(default, alias = "related_items")]
    pub related_items: BTreeSet<String>,
    /// Project key, when the tracker reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Issue type (Feature, Story, ...)
    #[serde(default, alias = "issue_type", skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    /// Priority as reported by the tracker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub components: BTreeSet<String>,
}

impl Ticket {
    /// Create a ticket with an id and summary.
    pub fn new(id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            description: String::new(),
            status: default_status(),
            related_items: BTreeSet::new(),
            project: None,
            issue_type: None,
            priority: None,
            labels: BTreeSet::new(),
            components: BTreeSet::new(),
        }
    }

    /// Ticket used when the real one cannot be fetched and the run continues
    /// in degraded mode.
    pub fn placeholder(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), format!("Feature from {}", id))
            .with_description("Placeholder ticket description")
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_related(mut self, reference: impl Into<String>) -> Self {
        self.related_items.insert(reference.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.components.insert(component.into());
        self
    }

    /// Project key: the explicit project, else the id prefix before `-`.
    pub fn project_key(&self) -> String {
        if let Some(project) = &self.project {
            return project.clone();
        }
        match self.id.split_once('-') {
            Some((prefix, _)) if !prefix.is_empty() => prefix.to_string(),
            _ => "FEAT".to_string(),
        }
    }

    /// Build the text handed to analysis agents.
    pub fn feature_description(&self, additional_context: Option<&str>) -> String {
        let description = if self.description.trim().is_empty() {
            "No description"
        } else {
            self.description.as_str()
        };

        let mut parts = vec![
            format!("Ticket ID: {}", self.id),
            format!("Summary: {}", self.summary),
            format!("Description: {}", description),
        ];

        if let Some(extra) = additional_context.filter(|c| !c.trim().is_empty()) {
            parts.push(format!("Additional Context: {}", extra.trim()));
        }

        parts.join("\n\n")
    }
}

/// Story priority. Ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    #[serde(alias = "low", alias = "LOW")]
    Low,
    #[default]
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "high", alias = "HIGH")]
    High,
    #[serde(alias = "critical", alias = "CRITICAL")]
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "lowest" | "minor" | "trivial" => Ok(Priority::Low),
            "medium" | "normal" => Ok(Priority::Medium),
            "high" | "major" => Ok(Priority::High),
            "critical" | "highest" | "blocker" => Ok(Priority::Critical),
            _ => Err(ModelError::UnknownPriority(s.to_string())),
        }
    }
}

/// Thematic concern an analysis contributes to.
///
/// Each populated theme seeds one epic during synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Architecture,
    UserExperience,
    Quality,
    Delivery,
}

const UX_KEYWORDS: &[&str] = &[
    "ux", "ui", "uxd", "design", "research", "frontend", "a11y", "accessibility", "usability",
];
const QUALITY_KEYWORDS: &[&str] = &[
    "qa", "test", "tester", "quality", "security", "sre", "reliability", "performance",
];
const DELIVERY_KEYWORDS: &[&str] = &[
    "manager", "product", "pm", "writer", "docs", "documentation", "delivery", "scrum", "program",
    "owner",
];

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Architecture => "architecture",
            Theme::UserExperience => "user_experience",
            Theme::Quality => "quality",
            Theme::Delivery => "delivery",
        }
    }

    /// Heading used as the epic title prefix.
    pub fn title(&self) -> &'static str {
        match self {
            Theme::Architecture => "Platform & Architecture",
            Theme::UserExperience => "User Experience",
            Theme::Quality => "Quality & Reliability",
            Theme::Delivery => "Delivery & Enablement",
        }
    }

    /// Label attached to work items of this theme.
    pub fn label(&self) -> &'static str {
        match self {
            Theme::Architecture => "architecture",
            Theme::UserExperience => "ux",
            Theme::Quality => "quality",
            Theme::Delivery => "delivery",
        }
    }

    /// Classify an agent name (e.g. `UX_ARCHITECT`, `backend_eng`) into a theme.
    ///
    /// Short keywords must match a whole name token; longer ones may match
    /// inside a token. Anything unmatched is architecture work.
    pub fn classify(agent_name: &str) -> Self {
        let lower = agent_name.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let matches = |keywords: &[&str]| {
            keywords.iter().any(|kw| {
                tokens
                    .iter()
                    .any(|t| *t == *kw || (kw.len() >= 5 && t.contains(kw)))
            })
        };

        if matches(UX_KEYWORDS) {
            Theme::UserExperience
        } else if matches(QUALITY_KEYWORDS) {
            Theme::Quality
        } else if matches(DELIVERY_KEYWORDS) {
            Theme::Delivery
        } else {
            Theme::Architecture
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "architecture" | "infrastructure" | "platform" => Ok(Theme::Architecture),
            "user_experience" | "ux" | "user_facing" => Ok(Theme::UserExperience),
            "quality" | "reliability" => Ok(Theme::Quality),
            "delivery" | "process" => Ok(Theme::Delivery),
            _ => Err(ModelError::UnknownTheme(s.to_string())),
        }
    }
}

/// Complexity estimate reported by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Complexity {
    Low,
    Medium,
    High,
    #[default]
    Unknown,
}

impl Complexity {
    /// Parse leniently; anything unrecognized is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "LOW" | "SMALL" => Complexity::Low,
            "MEDIUM" | "MODERATE" => Complexity::Medium,
            "HIGH" | "LARGE" => Complexity::High,
            _ => Complexity::Unknown,
        }
    }

    /// Base weight used by story point estimation.
    pub fn weight(&self) -> u32 {
        match self {
            Complexity::Low => 1,
            Complexity::Medium | Complexity::Unknown => 2,
            Complexity::High => 3,
        }
    }

    /// Ordering rank where `Unknown` is the lowest signal.
    pub fn rank(&self) -> u8 {
        match self {
            Complexity::Unknown => 0,
            Complexity::Low => 1,
            Complexity::Medium => 2,
            Complexity::High => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "LOW",
            Complexity::Medium => "MEDIUM",
            Complexity::High => "HIGH",
            Complexity::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for Complexity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value.as_str().map(Complexity::parse).unwrap_or_default())
    }
}

/// Story-only attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDetails {
    /// Story point estimate (`None` = unestimated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_points: Option<u32>,
    #[serde(default)]
    pub priority: Priority,
    /// Title of the parent epic (lookup only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_epic: Option<String>,
}

/// Kind of a work item. Stories carry their extra attributes inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "itemType", rename_all = "lowercase")]
pub enum WorkItemKind {
    Epic,
    Story(StoryDetails),
}

/// An epic or a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    #[serde(flatten)]
    pub kind: WorkItemKind,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub components: BTreeSet<String>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

impl WorkItem {
    /// Create an epic.
    pub fn epic(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: WorkItemKind::Epic,
            title: title.into(),
            description: description.into(),
            acceptance_criteria: Vec::new(),
            components: BTreeSet::new(),
            labels: BTreeSet::new(),
        }
    }

    /// Create a story under the epic titled `parent_epic`.
    pub fn story(
        title: impl Into<String>,
        description: impl Into<String>,
        parent_epic: impl Into<String>,
    ) -> Self {
        Self {
            kind: WorkItemKind::Story(StoryDetails {
                parent_epic: Some(parent_epic.into()),
                ..StoryDetails::default()
            }),
            title: title.into(),
            description: description.into(),
            acceptance_criteria: Vec::new(),
            components: BTreeSet::new(),
            labels: BTreeSet::new(),
        }
    }

    /// Create a story with no parent link.
    pub fn orphan_story(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: WorkItemKind::Story(StoryDetails::default()),
            title: title.into(),
            description: description.into(),
            acceptance_criteria: Vec::new(),
            components: BTreeSet::new(),
            labels: BTreeSet::new(),
        }
    }

    pub fn with_criterion(mut self, criterion: impl Into<String>) -> Self {
        self.acceptance_criteria.push(criterion.into());
        self
    }

    pub fn with_criteria(mut self, criteria: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.acceptance_criteria
            .extend(criteria.into_iter().map(Into::into));
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.components.insert(component.into());
        self
    }

    pub fn with_components(mut self, components: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.components.extend(components.into_iter().map(Into::into));
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    /// Set the story point estimate. No effect on epics.
    pub fn with_points(mut self, points: u32) -> Self {
        if let WorkItemKind::Story(details) = &mut self.kind {
            details.story_points = Some(points);
        }
        self
    }

    /// Set the priority. No effect on epics.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        if let WorkItemKind::Story(details) = &mut self.kind {
            details.priority = priority;
        }
        self
    }

    pub fn is_epic(&self) -> bool {
        matches!(self.kind, WorkItemKind::Epic)
    }

    pub fn is_story(&self) -> bool {
        matches!(self.kind, WorkItemKind::Story(_))
    }

    pub fn kind_str(&self) -> &'static str {
        match self.kind {
            WorkItemKind::Epic => "epic",
            WorkItemKind::Story(_) => "story",
        }
    }

    pub fn story_points(&self) -> Option<u32> {
        match &self.kind {
            WorkItemKind::Story(details) => details.story_points,
            WorkItemKind::Epic => None,
        }
    }

    pub fn priority(&self) -> Option<Priority> {
        match &self.kind {
            WorkItemKind::Story(details) => Some(details.priority),
            WorkItemKind::Epic => None,
        }
    }

    pub fn parent_epic(&self) -> Option<&str> {
        match &self.kind {
            WorkItemKind::Story(details) => details.parent_epic.as_deref(),
            WorkItemKind::Epic => None,
        }
    }
}

#[derive(Deserialize)]
struct BreakdownParts {
    #[serde(default)]
    epics: Vec<WorkItem>,
    #[serde(default)]
    stories: Vec<WorkItem>,
}

/// Epics and stories for one feature request.
///
/// Construction validates the parent-link invariant: every story's parent
/// epic, when set, names exactly one epic in the same breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BreakdownParts")]
pub struct Breakdown {
    epics: Vec<WorkItem>,
    stories: Vec<WorkItem>,
}

impl TryFrom<BreakdownParts> for Breakdown {
    type Error = ModelError;

    fn try_from(parts: BreakdownParts) -> Result<Self, Self::Error> {
        Breakdown::new(parts.epics, parts.stories)
    }
}

impl Breakdown {
    /// Build a breakdown, refusing one that violates its invariants.
    pub fn new(epics: Vec<WorkItem>, stories: Vec<WorkItem>) -> ModelResult<Self> {
        let breakdown = Self { epics, stories };
        let report = BreakdownValidator::validate(&breakdown);
        if !report.valid {
            return Err(ModelError::InvalidBreakdown(report.errors.join("; ")));
        }
        for warning in &report.warnings {
            debug!("Breakdown warning: {}", warning);
        }
        Ok(breakdown)
    }

    /// A breakdown with no items.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn epics(&self) -> &[WorkItem] {
        &self.epics
    }

    pub fn stories(&self) -> &[WorkItem] {
        &self.stories
    }

    pub fn epic_count(&self) -> usize {
        self.epics.len()
    }

    pub fn story_count(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epics.is_empty() && self.stories.is_empty()
    }

    /// Sum of story points over estimated stories.
    pub fn total_points(&self) -> u32 {
        self.stories.iter().filter_map(|s| s.story_points()).sum()
    }

    /// Stories whose parent is the epic titled `epic_title`.
    pub fn stories_for<'a>(&'a self, epic_title: &'a str) -> impl Iterator<Item = &'a WorkItem> + 'a {
        self.stories
            .iter()
            .filter(move |s| s.parent_epic() == Some(epic_title))
    }

    /// Union of components over all items.
    pub fn components(&self) -> BTreeSet<String> {
        self.epics
            .iter()
            .chain(self.stories.iter())
            .flat_map(|item| item.components.iter().cloned())
            .collect()
    }

    pub fn into_parts(self) -> (Vec<WorkItem>, Vec<WorkItem>) {
        (self.epics, self.stories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Critical);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_priority_parsing() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("blocker".parse::<Priority>().unwrap(), Priority::Critical);
        assert!("urgent-ish".parse::<Priority>().is_err());
    }

    #[test]
    fn test_theme_classification() {
        assert_eq!(Theme::classify("UX_ARCHITECT"), Theme::UserExperience);
        assert_eq!(Theme::classify("frontend_eng"), Theme::UserExperience);
        assert_eq!(Theme::classify("backend_eng"), Theme::Architecture);
        assert_eq!(Theme::classify("STAFF_ENGINEER"), Theme::Architecture);
        assert_eq!(Theme::classify("ENGINEERING_MANAGER"), Theme::Delivery);
        assert_eq!(Theme::classify("TECHNICAL_WRITER"), Theme::Delivery);
        assert_eq!(Theme::classify("SECURITY_ENGINEER"), Theme::Quality);
        // "ui" is only a whole-token match
        assert_eq!(Theme::classify("BUILD_ENGINEER"), Theme::Architecture);
    }

    #[test]
    fn test_complexity_lenient_parse() {
        assert_eq!(Complexity::parse("high"), Complexity::High);
        assert_eq!(Complexity::parse("enormous"), Complexity::Unknown);

        let parsed: Complexity = serde_json::from_value(serde_json::json!(42)).unwrap();
        assert_eq!(parsed, Complexity::Unknown);
    }

    #[test]
    fn test_ticket_feature_description() {
        let ticket = Ticket::new("RHOAIENG-669", "Model registry")
            .with_description("Track model versions");

        let text = ticket.feature_description(Some("Improve deployment"));
        assert!(text.starts_with("Ticket ID: RHOAIENG-669"));
        assert!(text.contains("Summary: Model registry"));
        assert!(text.contains("Additional Context: Improve deployment"));

        let bare = Ticket::new("X-1", "Bare").feature_description(None);
        assert!(bare.contains("Description: No description"));
        assert!(!bare.contains("Additional Context"));
    }

    #[test]
    fn test_ticket_placeholder_and_project_key() {
        let ticket = Ticket::placeholder("RHOAIENG-669");
        assert_eq!(ticket.summary, "Feature from RHOAIENG-669");
        assert_eq!(ticket.status, "Open");
        assert_eq!(ticket.project_key(), "RHOAIENG");

        assert_eq!(Ticket::new("noproject", "x").project_key(), "FEAT");
        assert_eq!(
            Ticket::new("A-1", "x").with_project("OTHER").project_key(),
            "OTHER"
        );
    }

    #[test]
    fn test_story_only_setters_ignore_epics() {
        let epic = WorkItem::epic("Epic", "desc")
            .with_points(8)
            .with_priority(Priority::High);
        assert_eq!(epic.story_points(), None);
        assert_eq!(epic.priority(), None);

        let story = WorkItem::story("Story", "desc", "Epic").with_points(3);
        assert_eq!(story.story_points(), Some(3));
        assert_eq!(story.priority(), Some(Priority::Medium));
        assert_eq!(story.parent_epic(), Some("Epic"));
    }

    #[test]
    fn test_work_item_serialization_shape() {
        let story = WorkItem::story("Story", "desc", "Epic")
            .with_points(5)
            .with_priority(Priority::Critical);
        let json = serde_json::to_value(&story).unwrap();

        assert_eq!(json["itemType"], "story");
        assert_eq!(json["storyPoints"], 5);
        assert_eq!(json["priority"], "Critical");
        assert_eq!(json["parentEpic"], "Epic");

        let epic = serde_json::to_value(WorkItem::epic("Epic", "desc")).unwrap();
        assert_eq!(epic["itemType"], "epic");
        assert!(epic.get("storyPoints").is_none());
    }

    #[test]
    fn test_breakdown_rejects_dangling_parent() {
        let epic = WorkItem::epic("Epic A", "desc");
        let story = WorkItem::story("Story", "desc", "epic a");

        let err = Breakdown::new(vec![epic], vec![story]).unwrap_err();
        assert!(matches!(err, ModelError::InvalidBreakdown(_)));
    }

    #[test]
    fn test_breakdown_totals() {
        let epic = WorkItem::epic("Epic", "desc").with_component("backend");
        let stories = vec![
            WorkItem::story("One", "d", "Epic").with_points(3),
            WorkItem::story("Two", "d", "Epic")
                .with_points(5)
                .with_component("frontend"),
            WorkItem::story("Three", "d", "Epic"),
        ];

        let breakdown = Breakdown::new(vec![epic], stories).unwrap();
        assert_eq!(breakdown.total_points(), 8);
        assert_eq!(breakdown.stories_for("Epic").count(), 3);
        assert_eq!(breakdown.components().len(), 2);
    }

    #[test]
    fn test_breakdown_deserialization_validates() {
        let json = serde_json::json!({
            "epics": [],
            "stories": [{"itemType": "story", "title": "S", "description": "d", "parentEpic": "Missing"}]
        });
        assert!(serde_json::from_value::<Breakdown>(json).is_err());
    }
}
