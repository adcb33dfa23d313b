//! # sizing_agents
//!
//! Analysis agents for the feature sizing workflow.
//!
//! Each agent looks at a ticket from one perspective and returns a JSON
//! payload. The workflow never inspects agent internals; it only needs the
//! [`AnalysisAgent`] contract and an [`AgentRegistry`] to dispatch over.
//!
//! ## Available Agents
//!
//! | Agent | Purpose |
//! |-------|---------|
//! | [`PersonaAgent`] | Deterministic keyword-driven analyst configured by a [`PersonaConfig`] |
//! | [`ScriptedAgent`] | Test double with a fixed outcome, delay, or panic |
//!
//! Personas can be loaded from a directory of YAML files with
//! [`AgentRegistry::load_from_dir`] or taken from the built-in set with
//! [`AgentRegistry::builtin`].

pub mod error;
pub mod payload;
pub mod persona;
pub mod registry;
pub mod scripted;
pub mod traits;

pub use error::{AgentError, AnalysisResult};
pub use payload::AnalysisPayload;
pub use persona::{builtin_personas, PersonaAgent, PersonaConfig};
pub use registry::AgentRegistry;
pub use scripted::{ScriptedAgent, ScriptedBehavior};
pub use traits::{AnalysisAgent, AnalysisContext};
