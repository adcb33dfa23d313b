//! Final response assembly.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sizing_model::{AgentResults, Ticket, WorkItem};

use crate::creator::CreationReport;
use crate::synthesis::{summary_line, Assessment, Synthesis};

/// Item counts of a breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownCounts {
    pub epics: usize,
    pub stories: usize,
    pub story_points: u32,
}

/// Everything a caller gets back from a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub run_id: String,
    pub original_ticket_id: String,
    pub original_summary: String,
    pub breakdown_summary: String,
    pub summary: BreakdownCounts,
    pub epics: Vec<WorkItem>,
    pub stories: Vec<WorkItem>,
    pub agent_results: AgentResults,
    pub assessment: Assessment,
    pub rationale: String,
    /// `null` unless creation was requested
    #[serde(default)]
    pub created_item_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_report: Option<CreationReport>,
    /// A placeholder ticket stood in for the real one
    #[serde(default)]
    pub degraded: bool,
    pub processing_time_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

impl WorkflowResult {
    pub fn total_points(&self) -> u32 {
        self.summary.story_points
    }
}

/// Inputs gathered over one run.
#[derive(Debug)]
pub struct AssemblyInput<'a> {
    pub run_id: &'a str,
    /// Id the caller asked for
    pub requested_id: &'a str,
    pub ticket: &'a Ticket,
    pub degraded: bool,
    pub synthesis: Synthesis,
    pub agent_results: AgentResults,
    pub creation: Option<CreationReport>,
    pub elapsed: Duration,
}

/// Pure composition of the final response.
pub struct ResponseAssembler;

impl ResponseAssembler {
    /// Build the response.
    ///
    /// # Panics
    ///
    /// If the synthesis summary disagrees with its own breakdown, which only a
    /// bug in the synthesis stage can cause.
    pub fn assemble(input: AssemblyInput<'_>) -> WorkflowResult {
        let Synthesis {
            breakdown,
            summary,
            rationale,
            assessment,
        } = input.synthesis;

        let counts = BreakdownCounts {
            epics: breakdown.epic_count(),
            stories: breakdown.story_count(),
            story_points: breakdown.total_points(),
        };
        assert!(
            summary.starts_with(&summary_line(&breakdown)),
            "breakdown summary '{}' does not match its breakdown",
            summary
        );

        let created_item_ids = input.creation.as_ref().map(|report| report.created_ids());
        let (epics, stories) = breakdown.into_parts();

        WorkflowResult {
            run_id: input.run_id.to_string(),
            original_ticket_id: input.requested_id.to_string(),
            original_summary: input.ticket.summary.clone(),
            breakdown_summary: summary,
            summary: counts,
            epics,
            stories,
            agent_results: input.agent_results,
            assessment,
            rationale,
            created_item_ids,
            creation_report: input.creation,
            degraded: input.degraded,
            processing_time_seconds: input.elapsed.as_secs_f64(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creator::ItemCreation;
    use crate::synthesis::SynthesisEngine;
    use serde_json::json;
    use sizing_model::AgentResult;

    fn synthesis(ticket: &Ticket) -> (Synthesis, AgentResults) {
        let mut results = AgentResults::new();
        results
            .record(AgentResult::success(
                "architect",
                json!({"recommendations": ["Add API", "Add schema"]}),
            ))
            .unwrap();
        let synthesis = SynthesisEngine::new().synthesize(ticket, &results).unwrap();
        (synthesis, results)
    }

    #[test]
    fn test_counts_match_items() {
        let ticket = Ticket::new("RHOAIENG-669", "Model registry");
        let (synthesis, results) = synthesis(&ticket);

        let result = ResponseAssembler::assemble(AssemblyInput {
            run_id: "run-1",
            requested_id: "RHOAIENG-669",
            ticket: &ticket,
            degraded: false,
            synthesis,
            agent_results: results,
            creation: None,
            elapsed: Duration::from_millis(1500),
        });

        assert_eq!(result.summary.epics, result.epics.len());
        assert_eq!(result.summary.stories, result.stories.len());
        assert_eq!(
            result.summary.story_points,
            result.stories.iter().filter_map(|s| s.story_points()).sum::<u32>()
        );
        assert!(result.created_item_ids.is_none());
        assert_eq!(result.processing_time_seconds, 1.5);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["originalTicketId"], "RHOAIENG-669");
        assert!(json["createdItemIds"].is_null());
        assert!(json.as_object().unwrap().contains_key("createdItemIds"));
    }

    #[test]
    fn test_created_ids_from_report() {
        let ticket = Ticket::new("RHOAIENG-669", "Model registry");
        let (synthesis, results) = synthesis(&ticket);
        let epic = synthesis.breakdown.epics()[0].clone();

        let mut report = CreationReport::new();
        report.push(ItemCreation::created(&epic, "RHOAIENG-1000"));

        let result = ResponseAssembler::assemble(AssemblyInput {
            run_id: "run-1",
            requested_id: "RHOAIENG-669",
            ticket: &ticket,
            degraded: false,
            synthesis,
            agent_results: results,
            creation: Some(report),
            elapsed: Duration::ZERO,
        });

        assert_eq!(result.created_item_ids, Some(vec!["RHOAIENG-1000".to_string()]));
    }
}
