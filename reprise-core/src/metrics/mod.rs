//! Per-run evaluator score collection
//!
//! A [`MetricsCollector`] accumulates the scores every evaluator produced
//! for one logical run (the original conversation, its replay, or a
//! framework failure) and archives a frozen snapshot under a run label.

pub mod collector;

#[cfg(test)]
mod tests;

pub use collector::{overall_score, ArchivedRun, MetricsCollector, RunMetrics, RunSummary, Scores};

/// Label for the original conversation's run
pub const ORIGINAL_LABEL: &str = "original";

/// Label for the replayed conversation's run
pub const REPLAYED_LABEL: &str = "replayed";
