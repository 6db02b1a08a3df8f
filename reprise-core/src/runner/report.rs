//! Test results

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::comparison::{Assessment, Comparison};
use crate::metrics::{ArchivedRun, RunSummary};
use crate::replay::ReplayOutcome;

/// Why a replay produced no actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayFailureKind {
    TriggerFailed,
    PollTimeout,
    FetchFailed,
}

/// Replay failure recorded on a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayFailure {
    /// Failure class
    pub kind: ReplayFailureKind,
    /// Diagnostic
    pub reason: String,
}

impl ReplayFailure {
    /// Failure described by an unsuccessful outcome; `None` for completed replays
    pub fn from_outcome(outcome: &ReplayOutcome) -> Option<Self> {
        let kind = match outcome {
            ReplayOutcome::Completed { .. } => return None,
            ReplayOutcome::TriggerFailed { .. } => ReplayFailureKind::TriggerFailed,
            ReplayOutcome::PollTimeout { .. } => ReplayFailureKind::PollTimeout,
            ReplayOutcome::FetchFailed { .. } => ReplayFailureKind::FetchFailed,
        };
        Some(Self {
            kind,
            reason: outcome.failure_reason().unwrap_or_default(),
        })
    }
}

/// Result of a test that ran to the end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    /// Test name
    pub test_name: String,
    /// Agent under test
    pub agent_id: String,
    /// Recorded conversation that was replayed
    pub original_conversation_id: String,
    /// Conversation created by the replay, if one was started
    pub replayed_conversation_id: Option<String>,
    /// Every archived run, per label
    pub evaluations: BTreeMap<String, Vec<ArchivedRun>>,
    /// Latest run per label with its overall score
    pub summaries: BTreeMap<String, RunSummary>,
    /// Original vs. replayed, present only when both runs were scored
    pub comparison: Option<Comparison>,
    /// Why the replay produced no actions
    pub replay_failure: Option<ReplayFailure>,
    /// Number of overridden tools
    pub simulated_tools: usize,
    /// Recorded tool runs left out of the simulation
    pub skipped_tool_runs: usize,
    /// Fail-closed was requested but could not be enforced, so tools
    /// without a recorded run executed live
    #[serde(default)]
    pub fail_closed_unenforced: bool,
}

impl TestReport {
    /// Headline verdict, when a comparison exists
    pub fn assessment(&self) -> Option<Assessment> {
        self.comparison.as_ref().map(|c| c.overall_assessment)
    }
}

/// Outcome of one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    /// Original data was unavailable; nothing was replayed
    Skipped { test_name: String, reason: String },
    /// The test ran; the replay itself may still have failed
    Finished(TestReport),
}

impl TestOutcome {
    /// Test name
    pub fn test_name(&self) -> &str {
        match self {
            Self::Skipped { test_name, .. } => test_name,
            Self::Finished(report) => &report.test_name,
        }
    }

    /// Whether the test was skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// Report of a finished test
    pub fn report(&self) -> Option<&TestReport> {
        match self {
            Self::Finished(report) => Some(report),
            Self::Skipped { .. } => None,
        }
    }
}
