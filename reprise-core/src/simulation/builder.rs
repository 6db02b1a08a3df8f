//! Construction of override configurations
//!
//! Two paths produce the same [`SimulationConfig`] shape:
//! - [`SimulationConfigBuilder::from_actions`] pins every recorded tool run
//!   of an original conversation, in order
//! - [`SimulationConfigBuilder::from_manual_overrides`] turns hand-authored
//!   fixtures into overrides

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use super::config::{ForcedState, OverrideEntry, RunIndex, SimulationConfig};
use crate::conversation::{extract_tool_data_from_run, extract_tool_runs, Action, ToolRunState};
use crate::json;

/// Output forced on tools that never ran originally under [`UnrunToolPolicy::FailClosed`]
pub const UNRUN_TOOL_OUTPUT: &str = "Tool was not invoked in the original conversation";

/// How tools absent from the original conversation behave during replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnrunToolPolicy {
    /// Leave them unconstrained so they execute live
    #[default]
    PassThrough,
    /// Force an error for every known tool without a recorded run
    FailClosed,
}

/// A hand-authored override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualOverride {
    /// Tool definition identity
    pub action_id: String,

    /// Output to force
    #[serde(default)]
    pub output: Value,

    /// 1-based invocation; `None` applies to any unmatched invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_index: Option<u32>,

    /// State to force
    #[serde(default)]
    pub state: ForcedState,
}

impl ManualOverride {
    /// Override every invocation of `action_id` with `output`
    pub fn new(action_id: impl Into<String>, output: Value) -> Self {
        Self {
            action_id: action_id.into(),
            output,
            run_index: None,
            state: ForcedState::Finished,
        }
    }

    /// Restrict to one 1-based invocation
    pub fn at_run(mut self, run_index: u32) -> Self {
        self.run_index = Some(run_index);
        self
    }

    /// Force the error state
    pub fn as_error(mut self) -> Self {
        self.state = ForcedState::Error;
        self
    }
}

/// A tool-run action left out of the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedToolRun {
    /// Identifier of the skipped action
    pub item_id: String,
    /// Why it was skipped
    pub reason: String,
}

/// Result of building from recorded actions
#[derive(Debug, Clone, Default)]
pub struct SimulationBuild {
    /// The override configuration
    pub config: SimulationConfig,
    /// Tool runs that could not be resolved
    pub skipped: Vec<SkippedToolRun>,
    /// Fail-closed was requested but no tool list was available to enforce it
    pub fail_closed_unenforced: bool,
}

/// Builder for [`SimulationConfig`]s
#[derive(Debug, Clone, Default)]
pub struct SimulationConfigBuilder {
    unrun_tools: UnrunToolPolicy,
    known_tools: BTreeSet<String>,
}

impl SimulationConfigBuilder {
    /// Create a builder with the pass-through policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how tools absent from the original are treated
    pub fn with_unrun_tool_policy(mut self, policy: UnrunToolPolicy) -> Self {
        self.unrun_tools = policy;
        self
    }

    /// Declare the agent's tools; only consulted under [`UnrunToolPolicy::FailClosed`]
    pub fn with_known_tools<I, S>(mut self, action_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_tools.extend(action_ids.into_iter().map(Into::into));
        self
    }

    /// Declare the agent's tools from platform tool configs (`studio_id` per entry)
    pub fn with_tools_config(self, tools_config: &[Value]) -> Self {
        let ids: Vec<String> = tools_config
            .iter()
            .filter_map(|tool| json::lookup_str(tool, "studio_id"))
            .map(str::to_string)
            .collect();
        self.with_known_tools(ids)
    }

    /// Pin every recorded tool run of `actions`.
    ///
    /// Each `action_id` gets invocation indices `1..=n` in original log order.
    /// Errored runs force the error state. Unresolvable runs are skipped and
    /// reported, never fatal.
    pub fn from_actions(&self, actions: &[Action]) -> SimulationBuild {
        let mut build = SimulationBuild::default();
        let mut run_indices: HashMap<String, u32> = HashMap::new();

        for action in extract_tool_runs(actions) {
            let Some(fact) = extract_tool_data_from_run(action) else {
                tracing::warn!(
                    item_id = %action.item_id,
                    "Skipping tool run with missing action_id, tool_id or state"
                );
                build.skipped.push(SkippedToolRun {
                    item_id: action.item_id.clone(),
                    reason: "missing action_id, tool_id or state".to_string(),
                });
                continue;
            };

            let counter = run_indices.entry(fact.action_id.clone()).or_insert(0);
            *counter += 1;
            let index = RunIndex::Nth(*counter);

            let state = match fact.state {
                ToolRunState::Error => ForcedState::Error,
                _ => ForcedState::Finished,
            };
            let entry = OverrideEntry::new(fact.output.unwrap_or(Value::Null), state);

            tracing::debug!(action_id = %fact.action_id, %index, ?state, "Pinned tool run");
            build.config.insert(fact.action_id, index, entry);
        }

        self.apply_unrun_policy(&mut build.config);
        build
    }

    /// Build from hand-authored overrides.
    ///
    /// Entries without an `action_id` or with `run_index == 0` are ignored.
    /// A later entry for the same key replaces an earlier one.
    pub fn from_manual_overrides(&self, overrides: &[ManualOverride]) -> SimulationConfig {
        let mut config = SimulationConfig::new();

        for manual in overrides {
            if manual.action_id.is_empty() {
                tracing::warn!("Ignoring manual override without action_id");
                continue;
            }
            let index = match manual.run_index {
                None => RunIndex::Default,
                Some(0) => {
                    tracing::warn!(action_id = %manual.action_id, "Ignoring manual override with run_index 0");
                    continue;
                }
                Some(n) => RunIndex::Nth(n),
            };
            config.insert(
                manual.action_id.clone(),
                index,
                OverrideEntry::new(manual.output.clone(), manual.state),
            );
        }

        self.apply_unrun_policy(&mut config);
        config
    }

    fn apply_unrun_policy(&self, config: &mut SimulationConfig) {
        if self.unrun_tools == UnrunToolPolicy::PassThrough {
            return;
        }
        for action_id in &self.known_tools {
            if config.tool_configs.contains_key(action_id) {
                continue;
            }
            tracing::debug!(%action_id, "Failing closed for tool absent from original");
            config.insert(
                action_id.clone(),
                RunIndex::Default,
                OverrideEntry::error(Value::String(UNRUN_TOOL_OUTPUT.to_string())),
            );
        }
    }
}

/// Pin every recorded tool run with the default pass-through policy
pub fn create_simulation_config_from_actions(actions: &[Action]) -> SimulationConfig {
    SimulationConfigBuilder::new().from_actions(actions).config
}

/// Build from manual overrides with the default pass-through policy
pub fn create_simulation_config_from_manual_overrides(
    overrides: &[ManualOverride],
) -> SimulationConfig {
    SimulationConfigBuilder::new().from_manual_overrides(overrides)
}
