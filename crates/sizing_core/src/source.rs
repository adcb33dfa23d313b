//! File-backed ticket source.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use sizing_model::Ticket;

use crate::fetcher::{FetchFailure, TicketFetcher};

#[derive(Deserialize)]
#[serde(untagged)]
enum TicketFile {
    Many(Vec<Ticket>),
    One(Ticket),
}

/// Reads tickets from a JSON file holding one ticket or an array of them.
///
/// The file is read on every fetch so edits are picked up between runs.
#[derive(Debug, Clone)]
pub struct FileTicketSource {
    path: PathBuf,
}

impl FileTicketSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TicketFetcher for FileTicketSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self, ticket_id: &str) -> Result<Ticket, FetchFailure> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            FetchFailure::connection(ticket_id, format!("{}: {}", self.path.display(), e))
        })?;

        let parsed: TicketFile = serde_json::from_str(&content).map_err(|e| {
            FetchFailure::malformed(ticket_id, format!("{}: {}", self.path.display(), e))
        })?;

        let tickets = match parsed {
            TicketFile::Many(tickets) => tickets,
            TicketFile::One(ticket) => vec![ticket],
        };
        debug!("{} holds {} ticket(s)", self.path.display(), tickets.len());

        tickets
            .into_iter()
            .find(|t| t.id.trim() == ticket_id)
            .ok_or_else(|| FetchFailure::not_found(ticket_id))
    }
}
