//! Override configuration types
//!
//! These serialize to the platform's debug-mode `tool_configs` document:
//!
//! ```json
//! {"tool_configs": {"<action_id>": {"overrides": {"1": { ... }, "default": { ... }}}}}
//! ```

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Which invocation of a tool an override applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunIndex {
    /// 1-based invocation ordinal
    Nth(u32),
    /// Any invocation not matched by an explicit ordinal
    Default,
}

impl RunIndex {
    const DEFAULT_KEY: &'static str = "default";
}

impl fmt::Display for RunIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunIndex::Nth(n) => write!(f, "{}", n),
            RunIndex::Default => f.write_str(Self::DEFAULT_KEY),
        }
    }
}

impl Serialize for RunIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RunIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RunIndexVisitor;

        impl Visitor<'_> for RunIndexVisitor {
            type Value = RunIndex;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a positive invocation index or \"default\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<RunIndex, E> {
                if v == RunIndex::DEFAULT_KEY {
                    return Ok(RunIndex::Default);
                }
                match v.parse::<u32>() {
                    Ok(n) if n > 0 => Ok(RunIndex::Nth(n)),
                    _ => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
                }
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<RunIndex, E> {
                match u32::try_from(v) {
                    Ok(n) if n > 0 => Ok(RunIndex::Nth(n)),
                    _ => Err(E::invalid_value(de::Unexpected::Unsigned(v), &self)),
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<RunIndex, E> {
                match u64::try_from(v) {
                    Ok(n) => self.visit_u64(n),
                    Err(_) => Err(E::invalid_value(de::Unexpected::Signed(v), &self)),
                }
            }
        }

        deserializer.deserialize_any(RunIndexVisitor)
    }
}

/// Approval behaviour forced on an overridden tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionBehaviour {
    NeverAsk,
}

/// What the agent does once a tool's retries are exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AfterRetriesBehaviour {
    TerminateConversation,
}

/// Retry policy forced on an overridden tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOverride {
    pub max_retries: u32,
    pub after_retries_behaviour: AfterRetriesBehaviour,
}

/// Action configuration forced on an overridden tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfigOverride {
    pub action_behaviour: ActionBehaviour,
    pub action_retry_config: RetryOverride,
}

impl ActionConfigOverride {
    /// Zero retries, terminate the conversation on exhaustion
    pub const NO_RETRY: Self = Self {
        action_behaviour: ActionBehaviour::NeverAsk,
        action_retry_config: RetryOverride {
            max_retries: 0,
            after_retries_behaviour: AfterRetriesBehaviour::TerminateConversation,
        },
    };
}

/// State a simulated tool run is forced into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForcedState {
    #[default]
    Finished,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OutputOverride {
    output: Value,
}

/// One simulated response for one invocation of one tool.
///
/// Every entry disables the tool's retries, so a replay failure surfaces as a
/// terminal conversation state instead of being retried into a different
/// outcome. Construct through [`OverrideEntry::new`] to keep that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideEntry {
    output_overrides_enabled: bool,
    output_overrides: OutputOverride,
    action_config_overrides: ActionConfigOverride,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    state_override_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state_override: Option<ForcedState>,
}

impl OverrideEntry {
    /// Force `output`; when `state` is `Error` also force the error state
    pub fn new(output: Value, state: ForcedState) -> Self {
        let is_error = state == ForcedState::Error;
        Self {
            output_overrides_enabled: true,
            output_overrides: OutputOverride { output },
            action_config_overrides: ActionConfigOverride::NO_RETRY,
            state_override_enabled: is_error,
            state_override: is_error.then_some(ForcedState::Error),
        }
    }

    /// Force a successful output
    pub fn finished(output: Value) -> Self {
        Self::new(output, ForcedState::Finished)
    }

    /// Force an error with the given body
    pub fn error(output: Value) -> Self {
        Self::new(output, ForcedState::Error)
    }

    /// Forced output payload
    pub fn output(&self) -> &Value {
        &self.output_overrides.output
    }

    /// Whether the error state is explicitly forced
    pub fn forces_error(&self) -> bool {
        self.state_override_enabled && self.state_override == Some(ForcedState::Error)
    }

    /// Forced action configuration
    pub fn action_config(&self) -> &ActionConfigOverride {
        &self.action_config_overrides
    }
}

/// All overrides for one tool, keyed by invocation index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOverrides {
    pub overrides: BTreeMap<RunIndex, OverrideEntry>,
}

/// Declarative override configuration handed to the replay environment.
///
/// Built fresh per test and not mutated once replay starts. Tools absent
/// from `tool_configs` run live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub tool_configs: BTreeMap<String, ToolOverrides>,
}

impl SimulationConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any previous one for the same key
    pub fn insert(&mut self, action_id: impl Into<String>, index: RunIndex, entry: OverrideEntry) {
        self.tool_configs
            .entry(action_id.into())
            .or_default()
            .overrides
            .insert(index, entry);
    }

    /// Look up the entry for one invocation
    pub fn get(&self, action_id: &str, index: RunIndex) -> Option<&OverrideEntry> {
        self.tool_configs.get(action_id)?.overrides.get(&index)
    }

    /// Entry the replay environment would apply to the given invocation,
    /// falling back to the `default` index
    pub fn resolve(&self, action_id: &str, invocation: u32) -> Option<&OverrideEntry> {
        let tool = self.tool_configs.get(action_id)?;
        tool.overrides
            .get(&RunIndex::Nth(invocation))
            .or_else(|| tool.overrides.get(&RunIndex::Default))
    }

    /// Number of overridden tools
    pub fn tool_count(&self) -> usize {
        self.tool_configs.len()
    }

    /// Total number of override entries
    pub fn entry_count(&self) -> usize {
        self.tool_configs.values().map(|t| t.overrides.len()).sum()
    }

    /// Whether no tool is overridden
    pub fn is_empty(&self) -> bool {
        self.tool_configs.is_empty()
    }

    /// Wire representation
    pub fn to_value(&self) -> crate::error::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
