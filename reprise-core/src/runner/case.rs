//! Test case and suite definitions

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::simulation::ManualOverride;

/// One replay test: a recorded conversation to replay and score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Display name; defaults to `sim_of_{conversation_id}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Agent under test
    pub agent_id: String,

    /// Recorded conversation to replay
    pub conversation_id: String,

    /// Evaluators to run; empty means the runner's defaults
    #[serde(default)]
    pub evaluators: Vec<String>,

    /// Hand-authored overrides used instead of the recorded tool runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Vec<ManualOverride>>,
}

impl TestCase {
    /// Create a test for one recorded conversation
    pub fn new(agent_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            name: None,
            agent_id: agent_id.into(),
            conversation_id: conversation_id.into(),
            evaluators: Vec::new(),
            overrides: None,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the evaluators
    pub fn with_evaluators<I, S>(mut self, evaluators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.evaluators = evaluators.into_iter().map(Into::into).collect();
        self
    }

    /// Replay with hand-authored overrides instead of the recorded tool runs
    pub fn with_overrides(mut self, overrides: Vec<ManualOverride>) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Name used for reports and the framework failure run
    pub fn test_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("sim_of_{}", self.conversation_id))
    }
}

/// A named collection of test cases
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    /// Suite name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Evaluators for cases that do not list their own
    #[serde(default)]
    pub evaluators: Vec<String>,

    /// Test cases, run in order
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

impl TestSuite {
    /// Load a suite from a `.json` file, or YAML for any other extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let suite: Self = if is_json {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        tracing::debug!(path = %path.display(), tests = suite.tests.len(), "Loaded test suite");
        Ok(suite)
    }

    /// Cases with suite-level evaluators filled in where a case lists none
    pub fn resolved_cases(&self) -> Vec<TestCase> {
        self.tests
            .iter()
            .cloned()
            .map(|mut case| {
                if case.evaluators.is_empty() {
                    case.evaluators = self.evaluators.clone();
                }
                case
            })
            .collect()
    }
}
