//! Tool usage within one conversation

use serde_json::Value;

use super::Evaluator;
use crate::conversation::{extract_tool_data_from_run, extract_tool_runs, Action};
use crate::error::Result;
use crate::metrics::Scores;

/// Counts tool runs, their error rate and argument breadth
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolCallingEvaluator;

impl Evaluator for ToolCallingEvaluator {
    fn name(&self) -> &'static str {
        "ToolCalling"
    }

    fn evaluate(
        &self,
        actions: &[Action],
        _agent_config: Option<&Value>,
        _agent_tools_config: Option<&[Value]>,
    ) -> Result<Scores> {
        let runs = extract_tool_runs(actions);
        let facts: Vec<_> = runs
            .iter()
            .filter_map(|action| extract_tool_data_from_run(action))
            .collect();

        let tool_count = facts.len() as f64;
        let tool_errors = if facts.is_empty() {
            0.0
        } else {
            facts.iter().filter(|f| f.state.is_error()).count() as f64 / tool_count
        };

        // Averaged over every tool-run action, resolved or not
        let avg_input_complexity = if runs.is_empty() {
            0.0
        } else {
            let total_args: usize = runs
                .iter()
                .filter_map(|action| action.content_at("input.arguments"))
                .filter_map(Value::as_object)
                .map(|arguments| arguments.len())
                .sum();
            total_args as f64 / runs.len() as f64
        };

        Ok(Scores::from([
            ("tool_count".to_string(), tool_count),
            ("tool_errors".to_string(), tool_errors),
            ("avg_input_complexity".to_string(), avg_input_complexity),
        ]))
    }
}
