//! Synthesis of agent analyses into an epic/story breakdown.
//!
//! Successful analyses are grouped by theme. Each populated theme becomes one
//! epic, and the distinct recommendations of its contributors become stories.
//! Failed agents contribute nothing; unreadable payloads still seed their
//! theme but add no content.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sizing_agents::AnalysisPayload;
use sizing_model::{
    AgentResults, Breakdown, Complexity, Priority, Theme, Ticket, WorkItem,
};

use crate::config::WorkflowConfig;
use crate::error::{CoreResult, WorkflowError};

const FIBONACCI: &[u32] = &[1, 2, 3, 5, 8, 13, 21, 34, 55, 89];
const AI_LABEL: &str = "ai-generated";

/// Story point estimate for a story with the given inputs.
///
/// `weight + criteria + concerns` rounded up to the next Fibonacci number and
/// clamped to `1..=max_points`.
pub fn estimate_points(complexity: Complexity, criteria: usize, concerns: usize, max_points: u32) -> u32 {
    let raw = complexity.weight() + criteria as u32 + concerns as u32;
    let rounded = FIBONACCI
        .iter()
        .copied()
        .find(|f| *f >= raw)
        .unwrap_or(raw);
    rounded.clamp(1, max_points.max(1))
}

/// Cross-agent view of the analyses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    /// Highest complexity any agent reported
    pub overall_complexity: Complexity,
    /// Recommendations given by at least two agents
    pub consensus_recommendations: Vec<String>,
    /// Concerns shared by at least two agents or flagged critical
    pub critical_risks: Vec<String>,
    /// Every component an agent said is required
    pub required_capabilities: Vec<String>,
    pub contributing_agents: Vec<String>,
    pub failed_agents: Vec<String>,
}

/// Output of the synthesis stage.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub breakdown: Breakdown,
    /// Count line, optionally followed by the components involved
    pub summary: String,
    pub rationale: String,
    pub assessment: Assessment,
}

/// Summary line for a breakdown.
pub fn summary_line(breakdown: &Breakdown) -> String {
    format!(
        "Feature breakdown completed: {} epic(s), {} stories, {} story points",
        breakdown.epic_count(),
        breakdown.story_count(),
        breakdown.total_points()
    )
}

struct Contributor {
    name: String,
    payload: Option<AnalysisPayload>,
}

impl Contributor {
    fn label(&self) -> &str {
        match &self.payload {
            Some(p) if !p.persona.trim().is_empty() => p.persona.trim(),
            _ => &self.name,
        }
    }

    fn complexity(&self) -> Complexity {
        self.payload
            .as_ref()
            .map(|p| p.estimated_complexity)
            .unwrap_or_default()
    }

    fn priority(&self) -> Option<Priority> {
        self.payload.as_ref().and_then(|p| p.priority())
    }

    fn concerns(&self) -> &[String] {
        self.payload.as_ref().map(|p| p.concerns.as_slice()).unwrap_or(&[])
    }

    fn recommendations(&self) -> &[String] {
        self.payload
            .as_ref()
            .map(|p| p.recommendations.as_slice())
            .unwrap_or(&[])
    }

    fn components(&self) -> &[String] {
        self.payload
            .as_ref()
            .map(|p| p.required_components.as_slice())
            .unwrap_or(&[])
    }
}

/// A recommendation merged across contributors.
struct Recommendation {
    text: String,
    contributors: Vec<usize>,
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches('.')
        .to_lowercase()
}

fn highest_complexity(values: impl Iterator<Item = Complexity>) -> Complexity {
    values.max_by_key(|c| c.rank()).unwrap_or_default()
}

/// Distinct texts across contributors with the number of agents giving each.
fn shared_items(
    contributors: &[&Contributor],
    items: fn(&Contributor) -> &[String],
) -> Vec<(String, usize)> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, (String, BTreeSet<&str>)> = HashMap::new();

    for contributor in contributors {
        for text in items(contributor) {
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let key = normalize(text);
            if !counts.contains_key(&key) {
                order.push(key.clone());
            }
            counts
                .entry(key)
                .or_insert_with(|| (text.to_string(), BTreeSet::new()))
                .1
                .insert(contributor.name.as_str());
        }
    }

    order
        .into_iter()
        .filter_map(|key| counts.remove(&key))
        .map(|(text, agents)| (text, agents.len()))
        .collect()
}

/// Turns agent results into a validated breakdown.
#[derive(Debug, Clone)]
pub struct SynthesisEngine {
    max_stories_per_epic: usize,
    max_story_points: u32,
    max_epic_criteria: usize,
    max_story_concerns: usize,
}

impl Default for SynthesisEngine {
    fn default() -> Self {
        Self {
            max_stories_per_epic: 6,
            max_story_points: 13,
            max_epic_criteria: 5,
            max_story_concerns: 2,
        }
    }
}

impl SynthesisEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self::default()
            .with_max_stories_per_epic(config.max_stories_per_epic)
            .with_max_story_points(config.max_story_points)
    }

    pub fn with_max_stories_per_epic(mut self, max: usize) -> Self {
        self.max_stories_per_epic = max.max(1);
        self
    }

    pub fn with_max_story_points(mut self, max: u32) -> Self {
        self.max_story_points = max.max(1);
        self
    }

    /// Synthesize using payload themes, falling back to agent-name classification.
    pub fn synthesize(&self, ticket: &Ticket, results: &AgentResults) -> CoreResult<Synthesis> {
        self.synthesize_with_themes(ticket, results, &HashMap::new())
    }

    /// Synthesize with per-agent theme hints (usually from the registry).
    ///
    /// Theme resolution order: payload `theme`, hint, name classification.
    pub fn synthesize_with_themes(
        &self,
        ticket: &Ticket,
        results: &AgentResults,
        hints: &HashMap<String, Theme>,
    ) -> CoreResult<Synthesis> {
        let mut groups: BTreeMap<Theme, Vec<Contributor>> = BTreeMap::new();
        let mut failed_agents = Vec::new();

        for (name, result) in results.iter() {
            let Some(value) = result.payload() else {
                failed_agents.push(name.clone());
                continue;
            };

            let payload = AnalysisPayload::from_value(value);
            if payload.is_none() {
                debug!("Payload from {} is unreadable; treating as empty", name);
            }

            let theme = payload
                .as_ref()
                .and_then(|p| p.theme())
                .or_else(|| hints.get(name).copied())
                .unwrap_or_else(|| Theme::classify(name));

            groups.entry(theme).or_default().push(Contributor {
                name: name.clone(),
                payload,
            });
        }

        let mut epics = Vec::new();
        let mut stories = Vec::new();
        for (theme, contributors) in &groups {
            let (epic, epic_stories) = self.build_epic(ticket, *theme, contributors);
            stories.extend(epic_stories);
            epics.push(epic);
        }

        let breakdown =
            Breakdown::new(epics, stories).map_err(|e| WorkflowError::Synthesis(e.to_string()))?;

        let all: Vec<&Contributor> = groups.values().flatten().collect();
        let assessment = Self::assess(&all, failed_agents);

        let mut summary = summary_line(&breakdown);
        let components = breakdown.components();
        if !components.is_empty() {
            summary.push_str(&format!(
                "\nComponents involved: {}",
                components.into_iter().collect::<Vec<_>>().join(", ")
            ));
        }

        let rationale = Self::rationale(results, &groups);
        info!("{}", summary_line(&breakdown));

        Ok(Synthesis {
            breakdown,
            summary,
            rationale,
            assessment,
        })
    }

    fn build_epic(
        &self,
        ticket: &Ticket,
        theme: Theme,
        contributors: &[Contributor],
    ) -> (WorkItem, Vec<WorkItem>) {
        let subject = if ticket.summary.trim().is_empty() {
            ticket.id.trim()
        } else {
            ticket.summary.trim()
        };
        let title = format!("{}: {}", theme.title(), subject);

        let mut description = format!(
            "{} work for {} aggregated from {} agent analysis(es):",
            theme.title(),
            ticket.id,
            contributors.len()
        );
        for contributor in contributors {
            let analysis = contributor
                .payload
                .as_ref()
                .map(|p| p.analysis.trim())
                .filter(|a| !a.is_empty())
                .unwrap_or("no analysis content");
            description.push_str(&format!("\n- {}: {}", contributor.label(), analysis));
        }

        let recommendations = Self::merge_recommendations(contributors);
        let components: BTreeSet<String> = contributors
            .iter()
            .flat_map(|c| c.components().iter().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect();

        let mut epic = WorkItem::epic(title.clone(), description)
            .with_components(components)
            .with_label(AI_LABEL)
            .with_label(theme.label());

        if recommendations.is_empty() {
            epic = epic.with_criterion(format!("{} impact of {} is reviewed", theme.title(), ticket.id));
        } else {
            epic = epic.with_criteria(
                recommendations
                    .iter()
                    .take(self.max_epic_criteria)
                    .map(|r| r.text.clone()),
            );
        }

        let theme_priority = contributors.iter().filter_map(|c| c.priority()).max();

        let stories = if recommendations.is_empty() {
            let indexes: Vec<usize> = (0..contributors.len()).collect();
            vec![self.build_story(
                format!("Refine {} scope for {}", theme.label(), ticket.id),
                &title,
                theme,
                contributors,
                &indexes,
                theme_priority,
            )]
        } else {
            recommendations
                .iter()
                .take(self.max_stories_per_epic)
                .map(|r| {
                    self.build_story(
                        r.text.clone(),
                        &title,
                        theme,
                        contributors,
                        &r.contributors,
                        theme_priority,
                    )
                })
                .collect()
        };

        (epic, stories)
    }

    fn build_story(
        &self,
        title: String,
        epic_title: &str,
        theme: Theme,
        contributors: &[Contributor],
        indexes: &[usize],
        fallback_priority: Option<Priority>,
    ) -> WorkItem {
        let sources: Vec<&Contributor> = indexes.iter().map(|i| &contributors[*i]).collect();

        let mut seen = BTreeSet::new();
        let concerns: Vec<&str> = sources
            .iter()
            .flat_map(|c| c.concerns().iter())
            .map(|c| c.trim())
            .filter(|c| !c.is_empty() && seen.insert(normalize(c)))
            .collect();

        let mut criteria = vec![
            "Implementation reviewed and merged".to_string(),
            "Behaviour covered by automated tests".to_string(),
        ];
        for concern in concerns.iter().take(self.max_story_concerns) {
            criteria.push(format!("Addresses: {}", concern));
        }

        let complexity = highest_complexity(sources.iter().map(|c| c.complexity()));
        let points = estimate_points(
            complexity,
            criteria.len(),
            concerns.len(),
            self.max_story_points,
        );

        let priority = sources
            .iter()
            .filter_map(|c| c.priority())
            .max()
            .or(fallback_priority)
            .unwrap_or_default();

        let recommended_by: Vec<&str> = sources.iter().map(|c| c.label()).collect();
        let description = format!("{}\n\nRecommended by: {}", title, recommended_by.join(", "));

        let components: BTreeSet<String> = sources
            .iter()
            .flat_map(|c| c.components().iter().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect();

        WorkItem::story(title, description, epic_title)
            .with_criteria(criteria)
            .with_components(components)
            .with_label(AI_LABEL)
            .with_label(theme.label())
            .with_points(points)
            .with_priority(priority)
    }

    fn merge_recommendations(contributors: &[Contributor]) -> Vec<Recommendation> {
        let mut merged: Vec<Recommendation> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (i, contributor) in contributors.iter().enumerate() {
            for text in contributor.recommendations() {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                let key = normalize(text);
                match index.get(&key) {
                    Some(&at) => {
                        if !merged[at].contributors.contains(&i) {
                            merged[at].contributors.push(i);
                        }
                    }
                    None => {
                        index.insert(key, merged.len());
                        merged.push(Recommendation {
                            text: text.to_string(),
                            contributors: vec![i],
                        });
                    }
                }
            }
        }

        merged
    }

    fn assess(contributors: &[&Contributor], failed_agents: Vec<String>) -> Assessment {
        let overall_complexity = highest_complexity(contributors.iter().map(|c| c.complexity()));

        let consensus_recommendations = shared_items(contributors, Contributor::recommendations)
            .into_iter()
            .filter(|(_, n)| *n >= 2)
            .map(|(text, _)| text)
            .collect();

        let critical_risks = shared_items(contributors, Contributor::concerns)
            .into_iter()
            .filter(|(text, n)| *n >= 2 || text.to_lowercase().contains("critical"))
            .map(|(text, _)| text)
            .collect();

        let required_capabilities: BTreeSet<String> = contributors
            .iter()
            .flat_map(|c| c.components().iter().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect();

        Assessment {
            overall_complexity,
            consensus_recommendations,
            critical_risks,
            required_capabilities: required_capabilities.into_iter().collect(),
            contributing_agents: contributors.iter().map(|c| c.name.clone()).collect(),
            failed_agents,
        }
    }

    fn rationale(results: &AgentResults, groups: &BTreeMap<Theme, Vec<Contributor>>) -> String {
        let mut text = format!(
            "Synthesized from {} of {} agent analyses.",
            results.success_count(),
            results.len()
        );

        if results.failure_count() > 0 {
            let failed: Vec<&str> = results.failures().map(|r| r.agent_name()).collect();
            text.push_str(&format!(" Failed agents: {}.", failed.join(", ")));
        }

        for (theme, contributors) in groups {
            let names: Vec<&str> = contributors.iter().map(|c| c.name.as_str()).collect();
            text.push_str(&format!(" {}: {}.", theme.title(), names.join(", ")));
        }

        text
    }
}
