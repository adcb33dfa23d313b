//! # sizing_core
//!
//! Workflow engine that turns one tracker ticket into a sized breakdown of
//! epics and stories.
//!
//! # Architecture
//!
//! - **Fetcher**: Resolves a ticket id through a [`TicketFetcher`] with a timeout
//! - **Dispatcher**: Runs every registered agent concurrently and collects one
//!   [`AgentResult`](sizing_model::AgentResult) per agent
//! - **Synthesis**: Groups agent output by theme into epics and stories
//! - **Creator**: Optionally writes the breakdown back through an [`ItemCreator`]
//! - **Progress**: Ordered, replayable stage events per run
//! - **Workflow**: The coordinator tying the stages together
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sizing_agents::AgentRegistry;
//! use sizing_core::{BreakdownRequest, BreakdownWorkflow, FileTicketSource};
//!
//! let workflow = BreakdownWorkflow::new(
//!     AgentRegistry::builtin()?,
//!     Arc::new(FileTicketSource::new("tickets.json")),
//! );
//!
//! let run = workflow.start(BreakdownRequest::new("RHOAIENG-669"))?;
//! let mut events = run.subscribe();
//! while let Some(event) = events.next().await {
//!     println!("[{:>3}%] {}", event.progress, event.message);
//! }
//! let result = run.wait().await?;
//! ```

pub mod assembler;
pub mod config;
pub mod creator;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod mock;
pub mod progress;
pub mod source;
pub mod synthesis;
pub mod workflow;

pub use assembler::{AssemblyInput, BreakdownCounts, ResponseAssembler, WorkflowResult};
pub use config::{FetchPolicy, WorkflowConfig};
pub use creator::{
    CreateFailure, CreationAdapter, CreationReport, CreationStatus, ItemCreation, ItemCreator,
};
pub use dispatcher::{analysis_progress, AgentDispatcher};
pub use error::{CoreResult, ErrorKind, WorkflowError};
pub use fetcher::{FetchAdapter, FetchFailure, FetchFailureKind, TicketFetcher};
pub use mock::{CapturedCreate, MockItemCreator, StaticTicketSource};
pub use progress::{
    ProgressError, ProgressEvent, ProgressLog, ProgressPublisher, ProgressStage,
    ProgressSubscriber,
};
pub use source::FileTicketSource;
pub use synthesis::{estimate_points, summary_line, Assessment, Synthesis, SynthesisEngine};
pub use workflow::{BreakdownRequest, BreakdownWorkflow, WorkflowRun};
