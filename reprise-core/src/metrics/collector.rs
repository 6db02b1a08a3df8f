//! Metrics collector implementation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Flat metric name to score mapping produced by one evaluator
pub type Scores = BTreeMap<String, f64>;

/// Evaluator name to scores, for one logical run
pub type RunMetrics = BTreeMap<String, Scores>;

/// A frozen run snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedRun {
    /// Scores per evaluator
    pub metrics: RunMetrics,
    /// When the run was archived
    pub recorded_at: DateTime<Utc>,
}

/// Latest snapshot of a label plus its derived score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scores per evaluator
    pub evaluators: RunMetrics,
    /// Unweighted mean of every score in the snapshot
    pub overall_score: f64,
}

impl RunSummary {
    fn from_run(run: &ArchivedRun) -> Self {
        Self {
            evaluators: run.metrics.clone(),
            overall_score: overall_score(&run.metrics),
        }
    }
}

/// Unweighted mean of every score across every evaluator; 0.0 when empty
pub fn overall_score(metrics: &RunMetrics) -> f64 {
    let (sum, count) = metrics
        .values()
        .flat_map(|scores| scores.values())
        .fold((0.0, 0usize), |(sum, count), score| (sum + score, count + 1));

    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Collects evaluator scores run by run.
///
/// Starts with no active run. One run is accumulated at a time; `end_run`
/// archives it under a label and leaves the collector with no active run.
/// The collector is owned by one test and passed by `&mut`, so a run can
/// never be written by two callers at once.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    active: Option<RunMetrics>,
    runs: BTreeMap<String, Vec<ArchivedRun>>,
}

impl MetricsCollector {
    /// Create a collector with no active run and no archived runs
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a run, discarding any unarchived scores
    pub fn start_run(&mut self) {
        if let Some(discarded) = self.active.replace(RunMetrics::new()) {
            if !discarded.is_empty() {
                tracing::warn!(
                    evaluators = discarded.len(),
                    "Discarding scores of a run that was never ended"
                );
            }
        }
    }

    /// Whether a run is being accumulated
    pub fn has_active_run(&self) -> bool {
        self.active.is_some()
    }

    /// Scores accumulated so far in the active run
    pub fn current(&self) -> Option<&RunMetrics> {
        self.active.as_ref()
    }

    /// Merge `scores` into the active run under `evaluator`.
    ///
    /// Keys already set for the same evaluator in this run are kept unless
    /// `scores` overwrites them. Opens a run if none is active.
    pub fn add_result(&mut self, evaluator: impl Into<String>, scores: Scores) {
        let evaluator = evaluator.into();
        let active = self.active.get_or_insert_with(|| {
            tracing::debug!("No active run, starting one implicitly");
            RunMetrics::new()
        });
        tracing::trace!(%evaluator, metrics = scores.len(), "Recording evaluator result");
        active.entry(evaluator).or_default().extend(scores);
    }

    /// Merge an untyped result.
    ///
    /// Inputs that are not a JSON object are ignored; entries whose value is
    /// not a number are dropped.
    pub fn add_raw_result(&mut self, evaluator: impl Into<String>, result: &Value) {
        let evaluator = evaluator.into();
        let Some(object) = result.as_object() else {
            tracing::warn!(%evaluator, "Ignoring evaluator result that is not a mapping");
            return;
        };

        let mut scores = Scores::new();
        for (metric, value) in object {
            match value.as_f64() {
                Some(score) => {
                    scores.insert(metric.clone(), score);
                }
                None => {
                    tracing::warn!(%evaluator, %metric, "Dropping non-numeric metric");
                }
            }
        }
        self.add_result(evaluator, scores);
    }

    /// Archive the active run under `label` and close it.
    ///
    /// Always appends a snapshot, even if no result was added.
    pub fn end_run(&mut self, label: impl Into<String>) {
        let label = label.into();
        let metrics = self.active.take().unwrap_or_default();
        tracing::debug!(%label, evaluators = metrics.len(), "Archiving run");
        self.runs.entry(label).or_default().push(ArchivedRun {
            metrics,
            recorded_at: Utc::now(),
        });
    }

    /// Latest snapshot archived under `label`
    pub fn get_latest_run_summary(&self, label: &str) -> Option<RunSummary> {
        self.runs
            .get(label)
            .and_then(|runs| runs.last())
            .map(RunSummary::from_run)
    }

    /// Latest metrics archived under `label`
    pub fn latest_metrics(&self, label: &str) -> Option<&RunMetrics> {
        self.runs
            .get(label)
            .and_then(|runs| runs.last())
            .map(|run| &run.metrics)
    }

    /// Every snapshot archived under `label`, oldest first
    pub fn get_run_results(&self, label: &str) -> &[ArchivedRun] {
        self.runs.get(label).map(Vec::as_slice).unwrap_or_default()
    }

    /// Latest summary of every label
    pub fn get_all_test_summaries(&self) -> BTreeMap<String, RunSummary> {
        self.runs
            .iter()
            .filter_map(|(label, runs)| {
                runs.last()
                    .map(|run| (label.clone(), RunSummary::from_run(run)))
            })
            .collect()
    }

    /// Labels with at least one archived run
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.runs.keys().map(String::as_str)
    }

    /// All archived runs, keyed by label
    pub fn archived_runs(&self) -> &BTreeMap<String, Vec<ArchivedRun>> {
        &self.runs
    }
}
