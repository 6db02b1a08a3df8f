//! Agent configuration quality

use serde_json::Value;
use std::collections::HashSet;

use super::Evaluator;
use crate::conversation::Action;
use crate::error::Result;
use crate::json;
use crate::metrics::Scores;

/// Scores the agent's setup: system prompt length and attached tool count.
///
/// Reads only the agent config; the conversation itself is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetupEvaluator;

impl SetupEvaluator {
    fn instructions_quality(agent_config: &Value) -> f64 {
        let Some(prompt) = agent_config.get("system_prompt") else {
            return 0.1;
        };
        let Some(prompt) = prompt.as_str() else {
            return 0.0;
        };

        match prompt.chars().count() {
            101..=4999 => 1.0,
            51..=100 | 5000..=9999 => 0.5,
            _ => 0.1,
        }
    }

    fn tools_config_quality(agent_config: &Value) -> f64 {
        let tools = match agent_config.get("actions") {
            None => return 0.0,
            Some(Value::Array(tools)) => tools,
            Some(_) => return 0.0,
        };
        if tools.is_empty() {
            return 0.0;
        }

        let mut seen = HashSet::new();
        for tool in tools {
            let id = json::lookup_str(tool, "chain_id").or_else(|| json::lookup_str(tool, "agent_id"));
            if let Some(id) = id {
                if !seen.insert(id) {
                    return 0.2;
                }
            }
        }

        match tools.len() {
            3..=7 => 1.0,
            1..=2 | 8..=10 => 0.7,
            _ => 0.4,
        }
    }

    fn complexity(agent_config: &Value) -> f64 {
        let instructions = Self::instructions_quality(agent_config);
        let tools = Self::tools_config_quality(agent_config);
        let tool_count = agent_config
            .get("actions")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);

        let mut score = 0.4 * instructions + 0.6 * tools;
        if tool_count > 10 {
            score *= 0.7;
        }
        score.clamp(0.0, 1.0)
    }
}

impl Evaluator for SetupEvaluator {
    fn name(&self) -> &'static str {
        "Setup"
    }

    fn evaluate(
        &self,
        _actions: &[Action],
        agent_config: Option<&Value>,
        _agent_tools_config: Option<&[Value]>,
    ) -> Result<Scores> {
        let Some(config) = agent_config else {
            tracing::warn!(evaluator = self.name(), "No agent config provided, scoring zero");
            return Ok(Scores::from([
                ("instructions_quality".to_string(), 0.0),
                ("tools_config_quality".to_string(), 0.0),
                ("complexity".to_string(), 0.0),
            ]));
        };

        Ok(Scores::from([
            ("instructions_quality".to_string(), Self::instructions_quality(config)),
            ("tools_config_quality".to_string(), Self::tools_config_quality(config)),
            ("complexity".to_string(), Self::complexity(config)),
        ]))
    }
}

#[cfg(test)]
mod setup_tests {
    use super::*;
    use serde_json::json;

    fn tools(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({"chain_id": format!("tool-{i}")})).collect()
    }

    #[test]
    fn test_instruction_bands() {
        let cases = [(10, 0.1), (60, 0.5), (100, 0.5), (101, 1.0), (4999, 1.0), (5000, 0.5), (10_000, 0.1)];
        for (len, expected) in cases {
            let config = json!({"system_prompt": "x".repeat(len)});
            assert_eq!(SetupEvaluator::instructions_quality(&config), expected, "length {len}");
        }
        assert_eq!(SetupEvaluator::instructions_quality(&json!({"system_prompt": 7})), 0.0);
    }

    #[test]
    fn test_tool_bands_and_duplicates() {
        for (n, expected) in [(0, 0.0), (2, 0.7), (5, 1.0), (9, 0.7), (12, 0.4)] {
            let config = json!({"actions": tools(n)});
            assert_eq!(SetupEvaluator::tools_config_quality(&config), expected, "{n} tools");
        }

        let duplicated = json!({"actions": [
            {"chain_id": "a"}, {"agent_id": "b"}, {"chain_id": "a"}
        ]});
        assert_eq!(SetupEvaluator::tools_config_quality(&duplicated), 0.2);
    }

    #[test]
    fn test_complexity_penalizes_many_tools() {
        let prompt = "x".repeat(200);
        let moderate = json!({"system_prompt": prompt, "actions": tools(5)});
        assert_eq!(SetupEvaluator::complexity(&moderate), 1.0);

        let crowded = json!({"system_prompt": prompt, "actions": tools(12)});
        let expected = (0.4 * 1.0 + 0.6 * 0.4) * 0.7;
        assert!((SetupEvaluator::complexity(&crowded) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_missing_config_scores_zero() {
        let scores = SetupEvaluator.evaluate(&[], None, None).unwrap();
        assert_eq!(scores.len(), 3);
        assert!(scores.values().all(|s| *s == 0.0));
    }
}
