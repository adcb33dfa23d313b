//! Item creation adapter.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use sizing_model::WorkItem;

/// Outcome for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CreationStatus {
    #[serde(rename_all = "camelCase")]
    Created { external_id: String },
    Failed { message: String },
}

/// Creation record for one epic or story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCreation {
    /// `epic` or `story`
    pub kind: String,
    pub title: String,
    #[serde(flatten)]
    pub status: CreationStatus,
}

impl ItemCreation {
    pub fn created(item: &WorkItem, external_id: impl Into<String>) -> Self {
        Self {
            kind: item.kind_str().to_string(),
            title: item.title.clone(),
            status: CreationStatus::Created {
                external_id: external_id.into(),
            },
        }
    }

    pub fn failed(item: &WorkItem, message: impl Into<String>) -> Self {
        Self {
            kind: item.kind_str().to_string(),
            title: item.title.clone(),
            status: CreationStatus::Failed {
                message: message.into(),
            },
        }
    }

    pub fn external_id(&self) -> Option<&str> {
        match &self.status {
            CreationStatus::Created { external_id } => Some(external_id),
            CreationStatus::Failed { .. } => None,
        }
    }
}

/// Per-item results of one creation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationReport {
    pub items: Vec<ItemCreation>,
    /// Errors that prevented creation as a whole
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl CreationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report for a call that created nothing.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            errors: vec![message.into()],
        }
    }

    pub fn push(&mut self, item: ItemCreation) {
        self.items.push(item);
    }

    /// External ids of created items, in creation order.
    pub fn created_ids(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|i| i.external_id().map(String::from))
            .collect()
    }

    pub fn created_count(&self) -> usize {
        self.items.iter().filter(|i| i.external_id().is_some()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.items.len() - self.created_count()
    }

    pub fn find(&self, title: &str) -> Option<&ItemCreation> {
        self.items.iter().find(|i| i.title == title)
    }
}

/// A creation call that failed as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Item creation failed: {message}")]
pub struct CreateFailure {
    pub message: String,
}

impl CreateFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Target system that epics and stories are written to.
#[async_trait]
pub trait ItemCreator: Send + Sync {
    fn name(&self) -> &str {
        "item-creator"
    }

    /// Create `epics` then `stories`, reporting each item's outcome.
    async fn create(
        &self,
        epics: &[WorkItem],
        stories: &[WorkItem],
    ) -> Result<CreationReport, CreateFailure>;
}

/// Timeout-bounded wrapper around an [`ItemCreator`].
///
/// Never fails: a total failure or timeout becomes a report with no created
/// items and an error note.
#[derive(Clone)]
pub struct CreationAdapter {
    creator: Arc<dyn ItemCreator>,
    timeout: Duration,
}

impl CreationAdapter {
    pub fn new(creator: Arc<dyn ItemCreator>) -> Self {
        Self {
            creator,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn create(&self, epics: &[WorkItem], stories: &[WorkItem]) -> CreationReport {
        match tokio::time::timeout(self.timeout, self.creator.create(epics, stories)).await {
            Ok(Ok(report)) => {
                info!(
                    "{} created {} item(s), {} failed",
                    self.creator.name(),
                    report.created_count(),
                    report.failed_count()
                );
                report
            }
            Ok(Err(failure)) => {
                warn!("{}: {}", self.creator.name(), failure);
                CreationReport::aborted(failure.to_string())
            }
            Err(_) => {
                warn!(
                    "{} did not finish within {}s",
                    self.creator.name(),
                    self.timeout.as_secs()
                );
                CreationReport::aborted(format!(
                    "Item creation timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
        }
    }
}

impl fmt::Debug for CreationAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreationAdapter")
            .field("creator", &self.creator.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_created_ids() {
        let epic = WorkItem::epic("Epic", "d");
        let story = WorkItem::story("Story", "d", "Epic");

        let mut report = CreationReport::new();
        report.push(ItemCreation::created(&epic, "FEAT-1000"));
        report.push(ItemCreation::failed(&story, "rejected"));

        assert_eq!(report.created_ids(), vec!["FEAT-1000".to_string()]);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.find("Story").unwrap().kind, "story");
    }

    #[test]
    fn test_item_creation_wire_format() {
        let epic = WorkItem::epic("Epic", "d");
        let json = serde_json::to_value(ItemCreation::created(&epic, "FEAT-1000")).unwrap();
        assert_eq!(json["status"], "created");
        assert_eq!(json["externalId"], "FEAT-1000");
        assert_eq!(json["kind"], "epic");
    }
}
