//! Overall workflow outcome

use serde_json::Value;

use super::Evaluator;
use crate::conversation::{Action, ConversationState};
use crate::error::Result;
use crate::metrics::Scores;

/// Scores whether the conversation ended in the completed state
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentProcedureEvaluator;

impl AgentProcedureEvaluator {
    fn final_outcome_success(actions: &[Action]) -> f64 {
        let completed = actions
            .last()
            .and_then(|last| last.get("metadata.conversation.state"))
            .and_then(Value::as_str)
            .is_some_and(|state| {
                state.eq_ignore_ascii_case(ConversationState::Completed.as_str())
            });

        if completed { 1.0 } else { 0.0 }
    }
}

impl Evaluator for AgentProcedureEvaluator {
    fn name(&self) -> &'static str {
        "AgentProcedure"
    }

    fn evaluate(
        &self,
        actions: &[Action],
        _agent_config: Option<&Value>,
        _agent_tools_config: Option<&[Value]>,
    ) -> Result<Scores> {
        Ok(Scores::from([
            ("final_outcome_success".to_string(), Self::final_outcome_success(actions)),
            // No progress signal is derived from the log yet
            ("action_advancement".to_string(), 0.5),
            ("conversation_length".to_string(), actions.len() as f64),
        ]))
    }
}
