//! # Reprise - Record and Replay Regression Testing for Conversational Agents
//!
//! Reprise takes a conversation an agent already had on a hosted agent
//! platform, pins every tool output the agent saw, replays the opening
//! user message against the current agent, and scores both conversations
//! to tell whether the agent got better or worse.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reprise_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RepriseConfig::load()?;
//!     let platform = Arc::new(HttpPlatform::from_config(&config.platform)?);
//!     let runner = TestRunner::from_config(platform, &config);
//!
//!     let outcome = runner.run_test(&TestCase::new("agent-1", "conv-42")).await?;
//!     if let Some(report) = outcome.report() {
//!         println!("{}: {:?}", report.test_name, report.assessment());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **conversation**: action records, tool-run and trigger extraction, lifecycle states
//! - **simulation**: per-tool output overrides built from recorded runs or by hand
//! - **platform**: the vendor seam, over HTTP or scripted in memory
//! - **replay**: trigger a replay and poll it to a terminal state, or regenerate failed conversations in place
//! - **eval**: pluggable evaluators and their registry
//! - **metrics** and **comparison**: archived scores and the original-vs-replay verdict
//! - **runner**: the end-to-end test pipeline and suites

pub mod comparison;
pub mod config;
pub mod conversation;
pub mod error;
pub mod eval;
pub mod json;
pub mod metrics;
pub mod platform;
pub mod replay;
pub mod runner;
pub mod simulation;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::comparison::{compare, Assessment, Comparison};
    pub use crate::config::{PlatformConfig, RepriseConfig, SimulationSettings};
    pub use crate::conversation::{
        extract_tool_data_from_run, extract_tool_runs, extract_trigger_message, Action,
        ConversationState, ConversationSummary, ToolRunFact, ToolRunState, TriggerMessage,
    };
    pub use crate::error::{RepriseError, Result};
    pub use crate::eval::{
        list_available_evaluators, load_evaluator, Evaluator, EvaluatorRegistry,
        EVALUATION_ERROR_METRIC,
    };
    pub use crate::metrics::{ArchivedRun, MetricsCollector, RunMetrics, RunSummary, Scores};
    pub use crate::platform::{AgentPlatform, HttpPlatform, PlatformCredentials, ScriptedPlatform};
    pub use crate::replay::{
        retrigger_failed_conversations, PollingConfig, ReplayOrchestrator, ReplayOutcome,
        ReplayPhase, RetriggerOutcome,
    };
    pub use crate::runner::{TestCase, TestOutcome, TestReport, TestRunner, TestSuite};
    pub use crate::simulation::{
        ManualOverride, RunIndex, SimulationConfig, SimulationConfigBuilder, UnrunToolPolicy,
    };
}
