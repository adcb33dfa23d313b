//! Ticket retrieval adapter.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use sizing_model::Ticket;

/// Category of a fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailureKind {
    Connection,
    NotFound,
    Malformed,
    Timeout,
}

impl fmt::Display for FetchFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchFailureKind::Connection => "connection",
            FetchFailureKind::NotFound => "not_found",
            FetchFailureKind::Malformed => "malformed",
            FetchFailureKind::Timeout => "timeout",
        };
        write!(f, "{}", s)
    }
}

/// Why a ticket could not be retrieved.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} while fetching '{ticket_id}': {message}")]
#[serde(rename_all = "camelCase")]
pub struct FetchFailure {
    pub kind: FetchFailureKind,
    pub ticket_id: String,
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: FetchFailureKind, ticket_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            ticket_id: ticket_id.into(),
            message: message.into(),
        }
    }

    pub fn connection(ticket_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchFailureKind::Connection, ticket_id, message)
    }

    pub fn not_found(ticket_id: impl Into<String>) -> Self {
        Self::new(FetchFailureKind::NotFound, ticket_id, "ticket does not exist")
    }

    pub fn malformed(ticket_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchFailureKind::Malformed, ticket_id, message)
    }

    pub fn timeout(ticket_id: impl Into<String>, after: Duration) -> Self {
        Self::new(
            FetchFailureKind::Timeout,
            ticket_id,
            format!("no response within {}s", after.as_secs()),
        )
    }
}

/// Source of tickets (tracker API, file, in-memory).
#[async_trait]
pub trait TicketFetcher: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "ticket-source"
    }

    async fn fetch(&self, ticket_id: &str) -> Result<Ticket, FetchFailure>;
}

/// Normalizing wrapper around a [`TicketFetcher`].
///
/// Trims the requested id, bounds the call with a timeout, and rejects
/// tickets whose id is empty or differs from the request.
#[derive(Clone)]
pub struct FetchAdapter {
    source: Arc<dyn TicketFetcher>,
    timeout: Duration,
}

impl FetchAdapter {
    pub fn new(source: Arc<dyn TicketFetcher>) -> Self {
        Self {
            source,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn fetch(&self, ticket_id: &str) -> Result<Ticket, FetchFailure> {
        let ticket_id = ticket_id.trim();
        if ticket_id.is_empty() {
            return Err(FetchFailure::malformed(ticket_id, "empty ticket id"));
        }

        debug!("Fetching {} from {}", ticket_id, self.source.name());
        let ticket = tokio::time::timeout(self.timeout, self.source.fetch(ticket_id))
            .await
            .map_err(|_| FetchFailure::timeout(ticket_id, self.timeout))??;

        let returned = ticket.id.trim();
        if returned.is_empty() {
            return Err(FetchFailure::malformed(ticket_id, "returned ticket has no id"));
        }
        if returned != ticket_id {
            return Err(FetchFailure::malformed(
                ticket_id,
                format!("returned ticket has id '{}'", returned),
            ));
        }

        Ok(ticket)
    }
}

impl fmt::Debug for FetchAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchAdapter")
            .field("source", &self.source.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}
