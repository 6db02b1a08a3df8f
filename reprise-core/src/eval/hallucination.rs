//! Hallucination signals

use serde_json::Value;

use super::Evaluator;
use crate::conversation::Action;
use crate::error::Result;
use crate::metrics::Scores;

const NEUTRAL_SCORE: f64 = 0.5;

const METRICS: [&str; 4] = [
    "context_adherence",
    "uncertainty_expression",
    "prompt_perplexity",
    "instruction_adherence",
];

/// Reports every hallucination metric at a neutral 0.5.
///
/// The metric keys are stable so comparisons line up once real scoring
/// lands; until then replays never move these deltas.
#[derive(Debug, Clone, Copy, Default)]
pub struct HallucinationEvaluator;

impl Evaluator for HallucinationEvaluator {
    fn name(&self) -> &'static str {
        "Hallucination"
    }

    fn evaluate(
        &self,
        _actions: &[Action],
        _agent_config: Option<&Value>,
        _agent_tools_config: Option<&[Value]>,
    ) -> Result<Scores> {
        Ok(METRICS
            .iter()
            .map(|metric| (metric.to_string(), NEUTRAL_SCORE))
            .collect())
    }
}
