//! Tests for the test runner

use super::*;
use crate::comparison::Assessment;
use crate::conversation::{Action, ConversationState};
use crate::error::{RepriseError, Result};
use crate::eval::{Evaluator, EvaluatorRegistry, EVALUATION_ERROR_METRIC};
use crate::metrics::{Scores, ORIGINAL_LABEL, REPLAYED_LABEL};
use crate::platform::{ScriptedPlatform, TriggerScript};
use crate::replay::PollingConfig;
use crate::simulation::{ManualOverride, RunIndex, UnrunToolPolicy, UNRUN_TOOL_OUTPUT};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const AGENT: &str = "agent-1";

fn trigger() -> Action {
    Action::new(
        "m1",
        json!({"type": "user-message", "is_trigger_message": true, "text": "Book a table"}),
    )
}

fn tool_run(id: &str, action_id: &str, state: &str) -> Action {
    Action::new(
        id,
        json!({
            "type": "tool-run",
            "action_details": {"action": action_id},
            "tool_config": {"id": format!("tool-{action_id}")},
            "tool_run_state": state,
            "output": {"ok": state == "finished"},
            "errors": [{"body": "failed"}],
        }),
    )
}

fn final_message(state: &str) -> Action {
    Action::new("end", json!({"type": "agent-message", "text": "Done"}))
        .with_field("metadata", json!({"conversation": {"state": state}}))
}

fn original_log() -> Vec<Action> {
    vec![
        trigger(),
        tool_run("t1", "lookup", "finished"),
        tool_run("t2", "reserve", "error"),
        final_message("unrecoverable"),
    ]
}

fn replayed_log() -> Vec<Action> {
    vec![
        trigger(),
        tool_run("r1", "lookup", "finished"),
        tool_run("r2", "reserve", "finished"),
        final_message("completed"),
    ]
}

fn runner(platform: ScriptedPlatform) -> (Arc<ScriptedPlatform>, TestRunner) {
    let platform = Arc::new(platform);
    let runner = TestRunner::new(platform.clone())
        .with_polling(PollingConfig::new(Duration::from_secs(1), 3));
    (platform, runner)
}

#[tokio::test(start_paused = true)]
async fn test_full_run_reports_improvement() {
    let (platform, runner) = runner(
        ScriptedPlatform::new()
            .with_agent(AGENT, json!({"agent_id": AGENT, "system_prompt": "Be helpful"}))
            .with_conversation("orig", original_log())
            .with_conversation("replay-1", replayed_log())
            .with_trigger(TriggerScript::Accept("replay-1".into()))
            .with_states(
                AGENT,
                "replay-1",
                [ConversationState::Running, ConversationState::Completed],
            ),
    );

    let outcome = runner.run_test(&TestCase::new(AGENT, "orig")).await.unwrap();
    let report = outcome.report().unwrap();

    assert_eq!(report.test_name, "sim_of_orig");
    assert_eq!(report.replayed_conversation_id.as_deref(), Some("replay-1"));
    assert!(report.replay_failure.is_none());
    assert_eq!(report.simulated_tools, 2);
    assert_eq!(report.evaluations[ORIGINAL_LABEL].len(), 1);
    assert_eq!(report.evaluations[REPLAYED_LABEL].len(), 1);

    let comparison = report.comparison.as_ref().unwrap();
    assert_eq!(comparison.delta("AgentProcedure", "final_outcome_success"), Some(1.0));
    assert_eq!(comparison.delta("ToolCalling", "tool_errors"), Some(-0.5));
    assert_eq!(report.assessment(), Some(Assessment::Improvement));

    // The recorded error run was pinned as an error
    let triggered = platform.triggered().await;
    assert_eq!(triggered[0].trigger_text, "Book a table");
    let reserve = triggered[0].simulation.get("reserve", RunIndex::Nth(1)).unwrap();
    assert!(reserve.forces_error());
    assert_eq!(reserve.output(), &json!("failed"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_conversation_is_skipped() {
    let (platform, runner) = runner(ScriptedPlatform::new());

    let outcome = runner.run_test(&TestCase::new(AGENT, "missing")).await.unwrap();

    assert!(outcome.is_skipped());
    assert_eq!(outcome.test_name(), "sim_of_missing");
    assert_eq!(platform.trigger_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_trigger_message_is_skipped() {
    let (_, runner) = runner(
        ScriptedPlatform::new().with_conversation("orig", vec![tool_run("t1", "lookup", "finished")]),
    );

    match runner.get_data(AGENT, "orig").await {
        Err(RepriseError::DataUnavailable(reason)) => assert!(reason.contains("trigger")),
        other => panic!("unexpected: {other:?}"),
    }
    let outcome = runner.run_test(&TestCase::new(AGENT, "orig")).await.unwrap();
    assert!(outcome.is_skipped());
}

#[tokio::test(start_paused = true)]
async fn test_trigger_failure_records_framework_run() {
    let (platform, runner) = runner(
        ScriptedPlatform::new()
            .with_conversation("orig", original_log())
            .with_trigger(TriggerScript::Fail("rate limited".into())),
    );
    let case = TestCase::new(AGENT, "orig").with_name("booking");

    let outcome = runner.run_test(&case).await.unwrap();
    let report = outcome.report().unwrap();

    assert!(report.comparison.is_none());
    assert!(report.replayed_conversation_id.is_none());
    let failure = report.replay_failure.as_ref().unwrap();
    assert_eq!(failure.kind, ReplayFailureKind::TriggerFailed);
    assert!(failure.reason.starts_with("Trigger failed"));

    let framework = &report.evaluations["booking"][0].metrics;
    assert_eq!(framework[FRAMEWORK_EVALUATOR][RUN_STATUS_METRIC], 0.0);
    assert!(report.evaluations.contains_key(ORIGINAL_LABEL));
    assert!(!report.evaluations.contains_key(REPLAYED_LABEL));
    assert_eq!(platform.list_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_timeout_records_framework_run() {
    let (platform, runner) = runner(
        ScriptedPlatform::new()
            .with_conversation("orig", original_log())
            .with_trigger(TriggerScript::Accept("replay-1".into()))
            .with_states(AGENT, "replay-1", [ConversationState::WaitingForCapacity]),
    );

    let outcome = runner.run_test(&TestCase::new(AGENT, "orig")).await.unwrap();
    let report = outcome.report().unwrap();

    assert_eq!(platform.list_calls(), 3);
    assert_eq!(report.replay_failure.as_ref().unwrap().kind, ReplayFailureKind::PollTimeout);
    assert_eq!(report.replayed_conversation_id.as_deref(), Some("replay-1"));
    assert!(report.comparison.is_none());
    assert!(report.summaries.contains_key("sim_of_orig"));
}

struct FailingEvaluator;

impl Evaluator for FailingEvaluator {
    fn name(&self) -> &'static str {
        "Failing"
    }

    fn evaluate(&self, _: &[Action], _: Option<&Value>, _: Option<&[Value]>) -> Result<Scores> {
        Err(RepriseError::evaluation("Failing", "no signal"))
    }
}

struct PanickingEvaluator;

impl Evaluator for PanickingEvaluator {
    fn name(&self) -> &'static str {
        "Panicking"
    }

    fn evaluate(&self, _: &[Action], _: Option<&Value>, _: Option<&[Value]>) -> Result<Scores> {
        panic!("evaluator bug")
    }
}

#[tokio::test(start_paused = true)]
async fn test_evaluator_failures_are_isolated() {
    let mut registry = EvaluatorRegistry::builtin();
    registry.register("Failing", || Box::new(FailingEvaluator));
    registry.register("Panicking", || Box::new(PanickingEvaluator));

    let (_, runner) = runner(
        ScriptedPlatform::new()
            .with_conversation("orig", original_log())
            .with_conversation("replay-1", replayed_log())
            .with_trigger(TriggerScript::Accept("replay-1".into()))
            .with_states(AGENT, "replay-1", [ConversationState::Completed]),
    );
    let runner = runner.with_registry(registry);
    let case = TestCase::new(AGENT, "orig").with_evaluators([
        "Failing",
        "Panicking",
        "ToolCalling",
        "NotRegistered",
    ]);

    let outcome = runner.run_test(&case).await.unwrap();
    let report = outcome.report().unwrap();
    let original = &report.evaluations[ORIGINAL_LABEL][0].metrics;

    assert_eq!(original["Failing"][EVALUATION_ERROR_METRIC], 1.0);
    assert_eq!(original["Panicking"][EVALUATION_ERROR_METRIC], 1.0);
    assert_eq!(original["ToolCalling"]["tool_count"], 2.0);
    assert!(!original.contains_key("NotRegistered"));
    assert!(report.comparison.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_manual_overrides_replace_recorded_runs() {
    let (platform, runner) = runner(
        ScriptedPlatform::new()
            .with_conversation("orig", original_log())
            .with_trigger(TriggerScript::NoId),
    );
    let case = TestCase::new(AGENT, "orig")
        .with_overrides(vec![ManualOverride::new("reserve", json!({"table": 4}))]);

    runner.run_test(&case).await.unwrap();

    let triggered = platform.triggered().await;
    let simulation = &triggered[0].simulation;
    assert_eq!(simulation.tool_count(), 1);
    assert_eq!(
        simulation.get("reserve", RunIndex::Default).unwrap().output(),
        &json!({"table": 4})
    );
}

#[tokio::test(start_paused = true)]
async fn test_fail_closed_without_tools_config_is_flagged() {
    let (platform, runner) = runner(
        ScriptedPlatform::new()
            .with_conversation("orig", original_log())
            .with_conversation("replay-1", replayed_log())
            .with_trigger(TriggerScript::Accept("replay-1".into()))
            .with_states(AGENT, "replay-1", [ConversationState::Completed]),
    );
    let runner = runner.with_unrun_tool_policy(UnrunToolPolicy::FailClosed);

    let outcome = runner.run_test(&TestCase::new(AGENT, "orig")).await.unwrap();
    let report = outcome.report().unwrap();

    assert!(report.fail_closed_unenforced);
    let triggered = platform.triggered().await;
    let simulation = &triggered[0].simulation;
    assert!(simulation.get("lookup", RunIndex::Default).is_none());
    assert!(simulation.get("reserve", RunIndex::Default).is_none());

    let rendered = serde_json::to_value(&outcome).unwrap();
    assert_eq!(rendered["fail_closed_unenforced"], true);
}

#[tokio::test(start_paused = true)]
async fn test_fail_closed_with_tools_config_is_enforced() {
    let (platform, runner) = runner(
        ScriptedPlatform::new()
            .with_tools(AGENT, vec![json!({"studio_id": "lookup"}), json!({"studio_id": "refund"})])
            .with_conversation("orig", original_log())
            .with_trigger(TriggerScript::NoId),
    );
    let runner = runner.with_unrun_tool_policy(UnrunToolPolicy::FailClosed);

    let outcome = runner.run_test(&TestCase::new(AGENT, "orig")).await.unwrap();
    assert!(!outcome.report().unwrap().fail_closed_unenforced);

    let triggered = platform.triggered().await;
    let refund = triggered[0].simulation.get("refund", RunIndex::Default).unwrap();
    assert!(refund.forces_error());
    assert_eq!(refund.output(), &json!(UNRUN_TOOL_OUTPUT));
}

#[tokio::test(start_paused = true)]
async fn test_suite_cases_inherit_evaluators() {
    let suite = TestSuite {
        name: Some("nightly".into()),
        evaluators: vec!["Safety".into()],
        tests: vec![
            TestCase::new(AGENT, "a"),
            TestCase::new(AGENT, "b").with_evaluators(["Setup"]),
        ],
    };

    let cases = suite.resolved_cases();
    assert_eq!(cases[0].evaluators, vec!["Safety"]);
    assert_eq!(cases[1].evaluators, vec!["Setup"]);

    let (_, runner) = runner(ScriptedPlatform::new());
    let outcomes = runner.run_suite(&suite).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(TestOutcome::is_skipped));
}

#[test]
fn test_suite_load_yaml_and_json() {
    let dir = tempfile::tempdir().unwrap();

    let yaml_path = dir.path().join("suite.yaml");
    std::fs::write(
        &yaml_path,
        r#"
name: nightly
evaluators: [ToolCalling]
tests:
  - agent_id: agent-1
    conversation_id: conv-1
  - name: pinned
    agent_id: agent-1
    conversation_id: conv-2
    overrides:
      - action_id: search
        output: "cached"
        run_index: 2
"#,
    )
    .unwrap();
    let suite = TestSuite::load(&yaml_path).unwrap();
    assert_eq!(suite.tests.len(), 2);
    assert_eq!(suite.tests[0].test_name(), "sim_of_conv-1");
    assert_eq!(suite.tests[1].test_name(), "pinned");
    assert_eq!(suite.tests[1].overrides.as_ref().unwrap()[0].run_index, Some(2));

    let json_path = dir.path().join("suite.json");
    std::fs::write(
        &json_path,
        r#"{"tests": [{"agent_id": "agent-1", "conversation_id": "conv-9"}]}"#,
    )
    .unwrap();
    let suite = TestSuite::load(&json_path).unwrap();
    assert_eq!(suite.tests[0].conversation_id, "conv-9");
    assert!(suite.evaluators.is_empty());

    assert!(TestSuite::load(dir.path().join("missing.yaml")).is_err());
}
