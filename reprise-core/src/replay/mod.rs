//! Replay orchestration
//!
//! Starts a new conversation from a recorded trigger message with tool
//! behaviour pinned by a [`SimulationConfig`](crate::simulation::SimulationConfig),
//! then polls the platform at a fixed interval until the conversation leaves
//! the active lifecycle states or the attempt budget runs out.
//!
//! [`retrigger_failed_conversations`] is the in-place counterpart: it resumes
//! failed conversations from the message before their last errored tool run.
//!
//! # Example
//!
//! ```rust,ignore
//! use reprise_core::replay::{PollingConfig, ReplayOrchestrator, ReplayOutcome};
//!
//! let mut orchestrator = ReplayOrchestrator::new(&platform, "agent-1")
//!     .with_polling(PollingConfig::default());
//!
//! match orchestrator.replay(&trigger.text, &simulation).await? {
//!     ReplayOutcome::Completed { actions, .. } => evaluate(&actions),
//!     other => eprintln!("replay failed: {}", other.failure_reason().unwrap_or_default()),
//! }
//! ```

mod orchestrator;
mod retrigger;

pub use orchestrator::{PollingConfig, ReplayOrchestrator, ReplayOutcome, ReplayPhase};
pub use retrigger::{retrigger_failed_conversations, RetriggerOutcome, DEFAULT_RETRIGGER_PAUSE_SECS};

/// Default wait between listing calls
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default number of listing calls before giving up
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 12;
