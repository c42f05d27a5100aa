//! Core engine of the cutover control plane: the job service, the run
//! state machine and pipeline orchestrator, the comparison stages, and
//! the reasoning capability.
//!
//! The REST boundary lives in `cutover-rest-service`; durable state in
//! `cutover-store`; browser access behind the `cutover-browser`
//! capability traits. Storage, driver and reasoner are all injected,
//! so tests substitute an in-memory scripted driver and a
//! deterministic reasoner.

pub mod context;
pub mod error;
pub mod har;
pub mod jobs;
pub mod orchestrator;
pub mod reasoner;
pub mod stages;

pub use context::{ArtifactBatch, RunContext, SideContexts};
pub use error::{Error, Result};
pub use jobs::JobService;
pub use orchestrator::{OrchestratorConfig, RunOrchestrator};
pub use reasoner::{llm::LlmConfig, llm::LlmReasoner, rules::RuleBasedReasoner, Reasoner};
