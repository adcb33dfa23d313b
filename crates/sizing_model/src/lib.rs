//! # sizing_model
//!
//! Data model shared by every stage of the feature sizing workflow.
//!
//! This crate holds the entities that flow through one breakdown run:
//!
//! - **Tickets**: the feature request fetched from the tracking system
//! - **Work items**: epics and stories, a tagged kind rather than a subtype
//! - **Breakdowns**: epics plus stories with the parent-link invariant enforced
//! - **Agent results**: the write-once mapping of per-agent outcomes
//!
//! ## Example
//!
//! ```rust
//! use sizing_model::{Breakdown, Priority, WorkItem};
//!
//! let epic = WorkItem::epic("Platform & Architecture: Model serving", "Serving changes");
//! let story = WorkItem::story("Add inference endpoint", "REST endpoint", epic.title.clone())
//!     .with_points(5)
//!     .with_priority(Priority::High);
//!
//! let breakdown = Breakdown::new(vec![epic], vec![story]).unwrap();
//! assert_eq!(breakdown.total_points(), 5);
//! ```

pub mod error;
pub mod models;
pub mod results;
pub mod validator;

pub use error::{ModelError, ModelResult};
pub use models::*;
pub use results::{AgentErrorKind, AgentResult, AgentResults};
pub use validator::{BreakdownValidator, ValidationResult};
