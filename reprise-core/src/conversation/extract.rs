//! Fact extraction from conversation logs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::Action;
use crate::json;

/// Output recorded for an errored tool run that carries no usable error list
pub const UNKNOWN_ERROR_OUTPUT: &str = "Unknown error structure";

/// The user-originated message that started a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerMessage {
    /// Message text
    pub text: String,
    /// Identifier of the action carrying the message
    pub message_id: String,
}

/// Outcome state of one tool run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolRunState {
    /// Tool returned an output
    Finished,
    /// Tool failed
    Error,
    /// Any in-progress or unrecognized state
    #[serde(untagged)]
    Other(String),
}

impl ToolRunState {
    /// Parse a vendor `tool_run_state` tag
    pub fn parse(raw: &str) -> Self {
        match raw {
            "finished" => Self::Finished,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the run failed
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

/// Typed projection of one tool-run action
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRunFact<'a> {
    /// Identity of the tool definition, stable across the agent's configuration
    pub action_id: String,
    /// Tool identifier
    pub tool_id: String,
    /// Human-readable tool title
    pub tool_title: Option<String>,
    /// Run state
    pub state: ToolRunState,
    /// Recorded output, or the extracted error body; `None` for in-progress states
    pub output: Option<Value>,
    /// Originating action, for traceability only
    pub action: &'a Action,
}

/// Return the first action flagged as the trigger message.
///
/// The trigger is not assumed to be first in the log; the whole sequence is
/// scanned in order.
pub fn extract_trigger_message(actions: &[Action]) -> Option<TriggerMessage> {
    actions
        .iter()
        .find(|action| action.is_trigger_message())
        .map(|action| TriggerMessage {
            text: action
                .content_at("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            message_id: action.item_id.clone(),
        })
}

/// Return the tool-run actions in original order
pub fn extract_tool_runs(actions: &[Action]) -> Vec<&Action> {
    actions.iter().filter(|action| action.is_tool_run()).collect()
}

/// Project a tool-run action into a [`ToolRunFact`].
///
/// Returns `None` when `action_id`, `tool_id` or `state` cannot be resolved;
/// callers skip such runs instead of failing the batch.
pub fn extract_tool_data_from_run(action: &Action) -> Option<ToolRunFact<'_>> {
    let action_id = json::lookup_str(&action.content, "action_details.action")?;
    let tool_id = json::lookup_str(&action.content, "tool_config.id")?;
    let state = ToolRunState::parse(json::lookup_str(&action.content, "tool_run_state")?);
    let tool_title = json::lookup_str(&action.content, "tool_config.title").map(str::to_string);

    let output = match state {
        ToolRunState::Finished => Some(
            action
                .content_at("output")
                .cloned()
                .unwrap_or(Value::Null),
        ),
        ToolRunState::Error => Some(error_output(action)),
        ToolRunState::Other(_) => None,
    };

    Some(ToolRunFact {
        action_id: action_id.to_string(),
        tool_id: tool_id.to_string(),
        tool_title,
        state,
        output,
        action,
    })
}

/// Keys under `original_message_ids` tried in order when choosing a message to regenerate
const REGENERATE_ID_KEYS: [&str; 3] = ["action-response", "action-error", "agent-error"];

/// Pick the message to regenerate from so a conversation re-runs its last failed tool.
///
/// Scans backwards for the latest errored tool run and answers the message
/// that preceded it: one of its `original_message_ids`, else its own item id.
/// When the predecessor yields nothing, earlier errored runs are tried. An
/// errored run at the very start of the log has no predecessor and is skipped.
pub fn regenerate_message_id(actions: &[Action]) -> Option<String> {
    actions
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, action)| {
            json::lookup_str(&action.content, "tool_run_state")
                .is_some_and(|state| ToolRunState::parse(state).is_error())
        })
        .filter_map(|(index, _)| index.checked_sub(1).map(|previous| &actions[previous]))
        .find_map(preceding_message_id)
}

fn preceding_message_id(action: &Action) -> Option<String> {
    let original = action.content_at("original_message_ids");
    REGENERATE_ID_KEYS
        .iter()
        .find_map(|key| original.and_then(|ids| ids.get(*key)).and_then(Value::as_str))
        .or_else(|| json::lookup_str(&action.content, "item_id"))
        .or_else(|| Some(action.item_id.as_str()).filter(|id| !id.is_empty()))
        .map(str::to_string)
}

/// First error entry's `raw`, then its `body`, then the entry itself
fn error_output(action: &Action) -> Value {
    let first_error = action
        .content_at("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first());

    match first_error {
        Some(entry) => json::lookup(entry, "raw")
            .or_else(|| json::lookup(entry, "body"))
            .unwrap_or(entry)
            .clone(),
        None => Value::String(UNKNOWN_ERROR_OUTPUT.to_string()),
    }
}

#[cfg(test)]
mod extract_tests {
    use super::*;
    use serde_json::json;

    fn tool_run(item_id: &str, action: &str, state: &str, extra: Value) -> Action {
        let mut content = json!({
            "type": "tool-run",
            "action_details": {"action": action},
            "tool_config": {"id": format!("tool-{action}"), "title": format!("Tool {action}")},
            "tool_run_state": state,
        });
        if let (Value::Object(target), Value::Object(extra)) = (&mut content, extra) {
            target.extend(extra);
        }
        Action::new(item_id, content)
    }

    #[test]
    fn test_trigger_message_found_anywhere_in_log() {
        let actions = vec![
            Action::new("a1", json!({"type": "agent-message", "text": "hi"})),
            Action::new("a2", json!({"type": "user-message", "is_trigger_message": true, "text": "start"})),
            Action::new("a3", json!({"type": "user-message", "is_trigger_message": true, "text": "later"})),
        ];

        let trigger = extract_trigger_message(&actions).unwrap();
        assert_eq!(trigger.text, "start");
        assert_eq!(trigger.message_id, "a2");
    }

    #[test]
    fn test_trigger_message_absent() {
        let actions = vec![Action::new("a1", json!({"type": "agent-message"}))];
        assert!(extract_trigger_message(&actions).is_none());
    }

    #[test]
    fn test_extract_tool_runs_preserves_order() {
        let actions = vec![
            tool_run("t1", "search", "finished", json!({})),
            Action::new("m1", json!({"type": "agent-message"})),
            tool_run("t2", "email", "finished", json!({})),
        ];

        let runs = extract_tool_runs(&actions);
        let ids: Vec<_> = runs.iter().map(|a| a.item_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[test]
    fn test_finished_run_uses_recorded_output() {
        let action = tool_run("t1", "search", "finished", json!({"output": {"hits": 3}}));
        let fact = extract_tool_data_from_run(&action).unwrap();

        assert_eq!(fact.action_id, "search");
        assert_eq!(fact.tool_id, "tool-search");
        assert_eq!(fact.tool_title.as_deref(), Some("Tool search"));
        assert_eq!(fact.state, ToolRunState::Finished);
        assert_eq!(fact.output, Some(json!({"hits": 3})));
        assert_eq!(fact.action.item_id, "t1");
    }

    #[test]
    fn test_error_output_fallback_chain() {
        let raw = tool_run("t1", "a", "error", json!({"errors": [{"raw": "raw body", "body": "body"}]}));
        assert_eq!(extract_tool_data_from_run(&raw).unwrap().output, Some(json!("raw body")));

        let body = tool_run("t2", "a", "error", json!({"errors": [{"body": "body only"}]}));
        assert_eq!(extract_tool_data_from_run(&body).unwrap().output, Some(json!("body only")));

        let whole = tool_run("t3", "a", "error", json!({"errors": [{"code": 500}]}));
        assert_eq!(extract_tool_data_from_run(&whole).unwrap().output, Some(json!({"code": 500})));

        let none = tool_run("t4", "a", "error", json!({}));
        assert_eq!(
            extract_tool_data_from_run(&none).unwrap().output,
            Some(json!(UNKNOWN_ERROR_OUTPUT))
        );
    }

    #[test]
    fn test_in_progress_run_has_no_output() {
        let action = tool_run("t1", "search", "running", json!({"output": "partial"}));
        let fact = extract_tool_data_from_run(&action).unwrap();

        assert_eq!(fact.state, ToolRunState::Other("running".to_string()));
        assert!(fact.output.is_none());
    }

    #[test]
    fn test_missing_identity_returns_none() {
        let no_action_id = Action::new(
            "t1",
            json!({"type": "tool-run", "tool_config": {"id": "x"}, "tool_run_state": "finished"}),
        );
        assert!(extract_tool_data_from_run(&no_action_id).is_none());

        let no_tool_id = Action::new(
            "t2",
            json!({"type": "tool-run", "action_details": {"action": "a"}, "tool_run_state": "finished"}),
        );
        assert!(extract_tool_data_from_run(&no_tool_id).is_none());

        let no_state = Action::new(
            "t3",
            json!({"type": "tool-run", "action_details": {"action": "a"}, "tool_config": {"id": "x"}}),
        );
        assert!(extract_tool_data_from_run(&no_state).is_none());
    }

    #[test]
    fn test_regenerate_id_prefers_action_response() {
        let actions = vec![
            Action::new("m1", json!({"type": "user-message"})),
            Action::new(
                "m2",
                json!({"type": "agent-message", "original_message_ids": {
                    "agent-error": "e-1",
                    "action-error": "ae-1",
                    "action-response": "ar-1",
                }}),
            ),
            tool_run("t1", "refund", "error", json!({})),
        ];
        assert_eq!(regenerate_message_id(&actions).as_deref(), Some("ar-1"));
    }

    #[test]
    fn test_regenerate_id_fallback_chain() {
        let with_ids = |ids: Value| {
            vec![
                Action::new("m1", json!({"type": "agent-message", "original_message_ids": ids})),
                tool_run("t1", "refund", "error", json!({})),
            ]
        };
        assert_eq!(
            regenerate_message_id(&with_ids(json!({"action-error": "ae", "agent-error": "e"}))).as_deref(),
            Some("ae")
        );
        assert_eq!(
            regenerate_message_id(&with_ids(json!({"agent-error": "e"}))).as_deref(),
            Some("e")
        );
        assert_eq!(regenerate_message_id(&with_ids(json!({}))).as_deref(), Some("m1"));

        let content_id = vec![
            Action::new("outer", json!({"type": "agent-message", "item_id": "inner"})),
            tool_run("t1", "refund", "error", json!({})),
        ];
        assert_eq!(regenerate_message_id(&content_id).as_deref(), Some("inner"));
    }

    #[test]
    fn test_regenerate_id_uses_latest_error() {
        let actions = vec![
            Action::new("m1", json!({"type": "agent-message"})),
            tool_run("t1", "lookup", "error", json!({})),
            Action::new("m2", json!({"type": "agent-message"})),
            tool_run("t2", "refund", "error", json!({})),
            tool_run("t3", "refund", "finished", json!({})),
        ];
        assert_eq!(regenerate_message_id(&actions).as_deref(), Some("m2"));
    }

    #[test]
    fn test_regenerate_id_skips_unusable_errors() {
        // Latest error's predecessor has no id at all; the earlier error is used
        let actions = vec![
            Action::new("m1", json!({"type": "agent-message"})),
            tool_run("t1", "lookup", "error", json!({})),
            Action::new("", json!({"type": "agent-message"})),
            tool_run("t2", "refund", "error", json!({})),
        ];
        assert_eq!(regenerate_message_id(&actions).as_deref(), Some("m1"));

        let leading = vec![tool_run("t1", "lookup", "error", json!({}))];
        assert!(regenerate_message_id(&leading).is_none());

        let clean = vec![
            Action::new("m1", json!({"type": "agent-message"})),
            tool_run("t1", "lookup", "finished", json!({})),
        ];
        assert!(regenerate_message_id(&clean).is_none());
    }
}
