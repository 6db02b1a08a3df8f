//! Deterministic tool simulation for replays
//!
//! A [`SimulationConfig`] tells the replay environment which output (or
//! error) each tool invocation must produce. Overrides are keyed by the
//! tool's `action_id` and a 1-based invocation index, so repeated calls to
//! the same tool are reproduced in their original order.
//!
//! # Example
//!
//! ```rust,ignore
//! use reprise_core::simulation::{SimulationConfigBuilder, UnrunToolPolicy};
//!
//! let build = SimulationConfigBuilder::new()
//!     .with_unrun_tool_policy(UnrunToolPolicy::PassThrough)
//!     .from_actions(&original_actions);
//!
//! assert!(build.skipped.is_empty());
//! let payload = build.config.to_value()?;
//! ```

mod builder;
mod config;

pub use builder::{
    create_simulation_config_from_actions, create_simulation_config_from_manual_overrides,
    ManualOverride, SimulationBuild, SimulationConfigBuilder, SkippedToolRun, UnrunToolPolicy,
    UNRUN_TOOL_OUTPUT,
};
pub use config::{
    ActionBehaviour, ActionConfigOverride, AfterRetriesBehaviour, ForcedState, OverrideEntry,
    RetryOverride, RunIndex, SimulationConfig, ToolOverrides,
};
