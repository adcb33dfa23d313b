//! Progress event channel.
//!
//! One run owns one [`ProgressPublisher`]. Events are appended to a buffered
//! log and every [`ProgressSubscriber`] reads that log from the beginning with
//! its own cursor, so a late subscriber still sees the full history in order.
//! The log closes after the terminal `completed` or `failed` event.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Notify;

use crate::error::ErrorKind;

/// Stage of a breakdown run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Received,
    FetchingTicket,
    AgentAnalysis,
    Synthesis,
    ItemCreation,
    Completed,
    Failed,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Received => "received",
            ProgressStage::FetchingTicket => "fetching_ticket",
            ProgressStage::AgentAnalysis => "agent_analysis",
            ProgressStage::Synthesis => "synthesis",
            ProgressStage::ItemCreation => "item_creation",
            ProgressStage::Completed => "completed",
            ProgressStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressStage::Completed | ProgressStage::Failed)
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub run_id: String,
    pub stage: ProgressStage,
    /// Percentage in `0..=100`
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_agents: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_agents: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(
        run_id: impl Into<String>,
        stage: ProgressStage,
        progress: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            stage,
            progress,
            message: message.into(),
            completed_agents: None,
            total_agents: None,
            error_kind: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_agents(mut self, completed: usize, total: usize) -> Self {
        self.completed_agents = Some(completed);
        self.total_agents = Some(total);
        self
    }

    pub fn with_error(mut self, kind: ErrorKind) -> Self {
        self.error_kind = Some(kind);
        self
    }
}

/// Errors from the progress channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgressError {
    #[error("Progress channel for run {0} is closed")]
    Closed(String),
}

#[derive(Debug, Default)]
struct LogState {
    events: Vec<ProgressEvent>,
    closed: bool,
    last_progress: u8,
}

#[derive(Debug)]
struct Shared {
    run_id: String,
    state: Mutex<LogState>,
    notify: Notify,
}

/// Read-side handle to a run's progress log. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    shared: Arc<Shared>,
}

impl ProgressLog {
    pub fn run_id(&self) -> &str {
        &self.shared.run_id
    }

    /// Subscriber positioned at the first event.
    pub fn subscribe(&self) -> ProgressSubscriber {
        ProgressSubscriber {
            shared: Arc::clone(&self.shared),
            cursor: 0,
        }
    }

    /// Snapshot of every event published so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.shared.state.lock().events.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

/// The single writer of a run's progress log.
#[derive(Debug)]
pub struct ProgressPublisher {
    log: ProgressLog,
}

impl ProgressPublisher {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            log: ProgressLog {
                shared: Arc::new(Shared {
                    run_id: run_id.into(),
                    state: Mutex::new(LogState::default()),
                    notify: Notify::new(),
                }),
            },
        }
    }

    pub fn run_id(&self) -> &str {
        self.log.run_id()
    }

    pub fn log(&self) -> ProgressLog {
        self.log.clone()
    }

    pub fn subscribe(&self) -> ProgressSubscriber {
        self.log.subscribe()
    }

    /// Publish a plain stage update.
    pub fn publish(
        &self,
        stage: ProgressStage,
        progress: u8,
        message: impl Into<String>,
    ) -> Result<ProgressEvent, ProgressError> {
        self.publish_event(ProgressEvent::new(self.run_id(), stage, progress, message))
    }

    /// Append an event to the log.
    ///
    /// Progress is clamped to `0..=100` and never moves backwards. A terminal
    /// event closes the log.
    pub fn publish_event(&self, mut event: ProgressEvent) -> Result<ProgressEvent, ProgressError> {
        {
            let mut state = self.log.shared.state.lock();
            if state.closed {
                return Err(ProgressError::Closed(self.log.shared.run_id.clone()));
            }

            event.run_id = self.log.shared.run_id.clone();
            event.progress = event.progress.min(100).max(state.last_progress);
            state.last_progress = event.progress;
            if event.stage.is_terminal() {
                state.closed = true;
            }
            state.events.push(event.clone());
        }

        self.log.shared.notify.notify_waiters();
        Ok(event)
    }
}

impl Drop for ProgressPublisher {
    /// A publisher dropped before a terminal event (the run task panicked or
    /// was aborted) ends the log with `failed` / `internal_error`.
    fn drop(&mut self) {
        if self.log.is_closed() {
            return;
        }
        let event = ProgressEvent::new(
            self.run_id(),
            ProgressStage::Failed,
            0,
            "Run ended unexpectedly",
        )
        .with_error(ErrorKind::InternalError);
        let _ = self.publish_event(event);
    }
}

/// Ordered reader over a progress log.
#[derive(Debug)]
pub struct ProgressSubscriber {
    shared: Arc<Shared>,
    cursor: usize,
}

impl ProgressSubscriber {
    /// Next event, waiting if none is available yet.
    ///
    /// Returns `None` once the log is closed and fully drained.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        let shared = Arc::clone(&self.shared);
        loop {
            let notified = shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = shared.state.lock();
                if let Some(event) = state.events.get(self.cursor) {
                    self.cursor += 1;
                    return Some(event.clone());
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Next event if one is already buffered.
    pub fn try_next(&mut self) -> Option<ProgressEvent> {
        let state = self.shared.state.lock();
        let event = state.events.get(self.cursor).cloned();
        if event.is_some() {
            self.cursor += 1;
        }
        event
    }

    /// Read until the log closes.
    pub async fn collect(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }

    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> {
        stream::unfold(self, |mut subscriber| async move {
            subscriber.next().await.map(|event| (event, subscriber))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let publisher = ProgressPublisher::new("run-1");
        publisher.publish(ProgressStage::Received, 0, "received").unwrap();
        publisher
            .publish(ProgressStage::AgentAnalysis, 50, "half")
            .unwrap();
        let event = publisher
            .publish(ProgressStage::AgentAnalysis, 40, "late")
            .unwrap();
        assert_eq!(event.progress, 50);

        let event = publisher
            .publish(ProgressStage::Completed, 250, "done")
            .unwrap();
        assert_eq!(event.progress, 100);
    }

    #[tokio::test]
    async fn test_publish_after_close_fails() {
        let publisher = ProgressPublisher::new("run-1");
        publisher.publish(ProgressStage::Failed, 10, "boom").unwrap();

        let err = publisher
            .publish(ProgressStage::Synthesis, 75, "too late")
            .unwrap_err();
        assert_eq!(err, ProgressError::Closed("run-1".into()));
        assert!(publisher.log().is_closed());
    }

    #[tokio::test]
    async fn test_late_subscriber_replays_history() {
        let publisher = ProgressPublisher::new("run-1");
        publisher.publish(ProgressStage::Received, 0, "a").unwrap();
        publisher
            .publish(ProgressStage::FetchingTicket, 10, "b")
            .unwrap();
        publisher.publish(ProgressStage::Completed, 100, "c").unwrap();

        let events = publisher.subscribe().collect().await;
        let stages: Vec<_> = events.iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![
                ProgressStage::Received,
                ProgressStage::FetchingTicket,
                ProgressStage::Completed
            ]
        );
    }

    #[tokio::test]
    async fn test_subscriber_waits_for_events() {
        let publisher = ProgressPublisher::new("run-1");
        let subscriber = publisher.subscribe();

        let reader = tokio::spawn(async move { subscriber.into_stream().collect::<Vec<_>>().await });

        for progress in [0u8, 10, 25] {
            publisher
                .publish(ProgressStage::FetchingTicket, progress, "step")
                .unwrap();
            tokio::task::yield_now().await;
        }
        publisher.publish(ProgressStage::Completed, 100, "done").unwrap();

        let events = reader.await.unwrap();
        assert_eq!(events.len(), 4);
        assert!(events.windows(2).all(|w| w[0].progress <= w[1].progress));
    }

    #[tokio::test]
    async fn test_dropped_publisher_ends_subscribers() {
        let publisher = ProgressPublisher::new("run-1");
        let subscriber = publisher.subscribe();
        publisher
            .publish(ProgressStage::FetchingTicket, 25, "a")
            .unwrap();
        drop(publisher);

        let events = subscriber.collect().await;
        assert_eq!(events.len(), 2);
        let last = &events[1];
        assert_eq!(last.stage, ProgressStage::Failed);
        assert_eq!(last.error_kind, Some(ErrorKind::InternalError));
        assert_eq!(last.progress, 25);
    }

    #[test]
    fn test_drop_after_terminal_event_adds_nothing() {
        let publisher = ProgressPublisher::new("run-1");
        let log = publisher.log();
        publisher.publish(ProgressStage::Completed, 100, "done").unwrap();
        drop(publisher);

        assert_eq!(log.events().len(), 1);
    }

    #[test]
    fn test_try_next() {
        let publisher = ProgressPublisher::new("run-1");
        let mut subscriber = publisher.subscribe();
        assert!(subscriber.try_next().is_none());

        publisher.publish(ProgressStage::Received, 0, "a").unwrap();
        assert_eq!(subscriber.try_next().unwrap().message, "a");
        assert!(subscriber.try_next().is_none());
    }

    #[test]
    fn test_event_wire_format() {
        let event = ProgressEvent::new("run-1", ProgressStage::AgentAnalysis, 38, "Completed analysis: SRE")
            .with_agents(3, 15);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["stage"], "agent_analysis");
        assert_eq!(json["completedAgents"], 3);
        assert_eq!(json["totalAgents"], 15);
        assert!(json.get("errorKind").is_none());
    }
}
