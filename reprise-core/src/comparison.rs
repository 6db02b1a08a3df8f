//! Original vs. replayed run comparison
//!
//! The report shape (`deltas`, `notes`, `overall_assessment`) is consumed by
//! downstream tooling and must stay stable.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::metrics::RunMetrics;

/// Evaluator and metric read for the outcome half of the verdict
pub const OUTCOME_METRIC: (&str, &str) = ("AgentProcedure", "final_outcome_success");

/// Evaluator and metric read for the error half of the verdict
pub const ERROR_METRIC: (&str, &str) = ("ToolCalling", "tool_errors");

/// Headline verdict of a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Assessment {
    Improvement,
    Regression,
    Neutral,
}

impl Assessment {
    /// Verdict from the outcome and tool-error deltas.
    ///
    /// Only these two metrics are consulted; every other delta is
    /// informational.
    pub fn from_deltas(outcome_delta: f64, error_delta: f64) -> Self {
        if outcome_delta > 0.0 && error_delta <= 0.0 {
            Self::Improvement
        } else if outcome_delta < 0.0 || error_delta > 0.0 {
            Self::Regression
        } else {
            Self::Neutral
        }
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Improvement => "IMPROVEMENT",
            Self::Regression => "REGRESSION",
            Self::Neutral => "NEUTRAL",
        };
        f.write_str(tag)
    }
}

/// Per-metric differences between two runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// `replayed - original` per evaluator and metric
    pub deltas: BTreeMap<String, BTreeMap<String, f64>>,
    /// Metrics present on one side only
    pub notes: Vec<String>,
    /// Headline verdict
    pub overall_assessment: Assessment,
}

impl Comparison {
    /// Delta for one metric, if either side had it
    pub fn delta(&self, evaluator: &str, metric: &str) -> Option<f64> {
        self.deltas.get(evaluator)?.get(metric).copied()
    }
}

/// Compare two runs metric by metric
pub fn compare(original: &RunMetrics, replayed: &RunMetrics) -> Comparison {
    let mut deltas: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    let mut notes = Vec::new();

    let evaluators: BTreeSet<&String> = original.keys().chain(replayed.keys()).collect();
    for evaluator in evaluators {
        let before = original.get(evaluator);
        let after = replayed.get(evaluator);
        let metrics: BTreeSet<&String> = before
            .into_iter()
            .flat_map(|scores| scores.keys())
            .chain(after.into_iter().flat_map(|scores| scores.keys()))
            .collect();

        let evaluator_deltas = deltas.entry(evaluator.clone()).or_default();
        for metric in metrics {
            let old = before.and_then(|scores| scores.get(metric));
            let new = after.and_then(|scores| scores.get(metric));
            let delta = match (old, new) {
                (Some(old), Some(new)) => new - old,
                (None, Some(new)) => {
                    notes.push(format!("Metric '{evaluator}.{metric}' added in replay."));
                    *new
                }
                (Some(old), None) => {
                    notes.push(format!("Metric '{evaluator}.{metric}' removed in replay."));
                    -old
                }
                (None, None) => continue,
            };
            evaluator_deltas.insert(metric.clone(), delta);
        }
    }

    let lookup = |(evaluator, metric): (&str, &str)| -> f64 {
        deltas
            .get(evaluator)
            .and_then(|scores| scores.get(metric))
            .copied()
            .unwrap_or(0.0)
    };
    let overall_assessment = Assessment::from_deltas(lookup(OUTCOME_METRIC), lookup(ERROR_METRIC));

    Comparison {
        deltas,
        notes,
        overall_assessment,
    }
}
