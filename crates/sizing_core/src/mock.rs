//! In-memory ticket source and item creator for testing.
//!
//! Both doubles capture calls for verification and can simulate failures,
//! so workflow behaviour can be exercised without a real tracker.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use sizing_model::{Ticket, WorkItem};

use crate::creator::{CreateFailure, CreationReport, ItemCreation, ItemCreator};
use crate::fetcher::{FetchFailure, FetchFailureKind, TicketFetcher};

/// Ticket source backed by a map.
#[derive(Clone, Default)]
pub struct StaticTicketSource {
    tickets: Arc<RwLock<HashMap<String, Ticket>>>,
    simulate_failure: Arc<RwLock<Option<FetchFailureKind>>>,
    delay: Option<Duration>,
    captured_calls: Arc<RwLock<Vec<String>>>,
}

impl StaticTicketSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ticket that "exists".
    pub fn with_ticket(self, ticket: Ticket) -> Self {
        self.tickets.write().insert(ticket.id.clone(), ticket);
        self
    }

    /// Fail every fetch with the given kind.
    pub fn simulate_failure(self, kind: FetchFailureKind) -> Self {
        *self.simulate_failure.write() = Some(kind);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Ids requested so far.
    pub fn captured_calls(&self) -> Vec<String> {
        self.captured_calls.read().clone()
    }
}

#[async_trait]
impl TicketFetcher for StaticTicketSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, ticket_id: &str) -> Result<Ticket, FetchFailure> {
        self.captured_calls.write().push(ticket_id.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = *self.simulate_failure.read();
        if let Some(kind) = failure {
            return Err(FetchFailure::new(kind, ticket_id, "simulated failure"));
        }

        self.tickets
            .read()
            .get(ticket_id)
            .cloned()
            .ok_or_else(|| FetchFailure::not_found(ticket_id))
    }
}

/// Captured `create` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCreate {
    pub epic_titles: Vec<String>,
    pub story_titles: Vec<String>,
}

/// Item creator that issues sequential `{project}-{1000+n}` ids.
///
/// Epics are created before stories. A story whose parent epic was not
/// created is reported as failed.
#[derive(Clone)]
pub struct MockItemCreator {
    project: String,
    issued: Arc<RwLock<usize>>,
    failing_titles: Arc<RwLock<HashSet<String>>>,
    simulate_failure: Arc<RwLock<Option<String>>>,
    delay: Option<Duration>,
    captured_calls: Arc<RwLock<Vec<CapturedCreate>>>,
}

impl MockItemCreator {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            issued: Arc::new(RwLock::new(0)),
            failing_titles: Arc::new(RwLock::new(HashSet::new())),
            simulate_failure: Arc::new(RwLock::new(None)),
            delay: None,
            captured_calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Reject the item with this exact title.
    pub fn fail_title(self, title: impl Into<String>) -> Self {
        self.failing_titles.write().insert(title.into());
        self
    }

    /// Fail the whole call.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn captured_calls(&self) -> Vec<CapturedCreate> {
        self.captured_calls.read().clone()
    }

    fn next_id(&self) -> String {
        let mut issued = self.issued.write();
        let id = format!("{}-{}", self.project, 1000 + *issued);
        *issued += 1;
        id
    }
}

#[async_trait]
impl ItemCreator for MockItemCreator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create(
        &self,
        epics: &[WorkItem],
        stories: &[WorkItem],
    ) -> Result<CreationReport, CreateFailure> {
        self.captured_calls.write().push(CapturedCreate {
            epic_titles: epics.iter().map(|e| e.title.clone()).collect(),
            story_titles: stories.iter().map(|s| s.title.clone()).collect(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.simulate_failure.read().clone();
        if let Some(message) = failure {
            return Err(CreateFailure::new(message));
        }

        let failing = self.failing_titles.read().clone();
        let mut report = CreationReport::new();
        let mut created_epics = HashSet::new();

        for epic in epics {
            if failing.contains(&epic.title) {
                report.push(ItemCreation::failed(epic, "rejected by tracker"));
            } else {
                report.push(ItemCreation::created(epic, self.next_id()));
                created_epics.insert(epic.title.clone());
            }
        }

        for story in stories {
            if failing.contains(&story.title) {
                report.push(ItemCreation::failed(story, "rejected by tracker"));
                continue;
            }
            match story.parent_epic() {
                Some(parent) if !created_epics.contains(parent) => {
                    report.push(ItemCreation::failed(
                        story,
                        format!("parent epic '{}' was not created", parent),
                    ));
                }
                _ => report.push(ItemCreation::created(story, self.next_id())),
            }
        }

        Ok(report)
    }
}
