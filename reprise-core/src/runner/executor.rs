//! Test execution

use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::Instrument;

use super::case::{TestCase, TestSuite};
use super::report::{ReplayFailure, TestOutcome, TestReport};
use crate::comparison::compare;
use crate::config::RepriseConfig;
use crate::conversation::{extract_trigger_message, Action, TriggerMessage};
use crate::error::{RepriseError, Result};
use crate::eval::{evaluation_error_scores, Evaluator, EvaluatorRegistry};
use crate::metrics::{MetricsCollector, Scores, ORIGINAL_LABEL, REPLAYED_LABEL};
use crate::platform::AgentPlatform;
use crate::replay::{PollingConfig, ReplayOrchestrator, ReplayOutcome};
use crate::simulation::{
    ManualOverride, SimulationBuild, SimulationConfig, SimulationConfigBuilder, UnrunToolPolicy,
};

/// Evaluator name of the pseudo-run recorded when a replay fails
pub const FRAMEWORK_EVALUATOR: &str = "Framework";

/// Metric of the framework pseudo-run
pub const RUN_STATUS_METRIC: &str = "run_status";

/// Evaluators used when neither the test nor the runner names any
pub const DEFAULT_EVALUATORS: [&str; 3] = ["Setup", "ToolCalling", "AgentProcedure"];

/// Everything loaded from the platform before a replay
#[derive(Debug, Clone)]
pub struct TestData {
    /// Agent configuration, if the platform had one
    pub agent_config: Option<Value>,
    /// Agent tool configurations, if the platform had them
    pub agent_tools_config: Option<Vec<Value>>,
    /// Recorded conversation, ascending by insertion time
    pub original_actions: Vec<Action>,
    /// Message that started the recorded conversation
    pub trigger_message: TriggerMessage,
}

/// Runs replay tests against an agent platform.
///
/// Each test runs strictly in sequence: load, evaluate the original, replay,
/// evaluate the replay, compare. Every test gets its own [`MetricsCollector`].
pub struct TestRunner {
    platform: Arc<dyn AgentPlatform>,
    registry: EvaluatorRegistry,
    polling: PollingConfig,
    unrun_tools: UnrunToolPolicy,
    default_evaluators: Vec<String>,
}

impl TestRunner {
    /// Create a runner with built-in evaluators and default polling
    pub fn new(platform: Arc<dyn AgentPlatform>) -> Self {
        Self {
            platform,
            registry: EvaluatorRegistry::builtin(),
            polling: PollingConfig::default(),
            unrun_tools: UnrunToolPolicy::default(),
            default_evaluators: DEFAULT_EVALUATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create a runner from loaded configuration
    pub fn from_config(platform: Arc<dyn AgentPlatform>, config: &RepriseConfig) -> Self {
        Self::new(platform)
            .with_polling(config.polling)
            .with_unrun_tool_policy(config.simulation.unrun_tools)
            .with_default_evaluators(config.evaluators.clone())
    }

    /// Use a custom evaluator registry
    pub fn with_registry(mut self, registry: EvaluatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Override the polling budget
    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    /// Set how tools absent from the original are treated
    pub fn with_unrun_tool_policy(mut self, policy: UnrunToolPolicy) -> Self {
        self.unrun_tools = policy;
        self
    }

    /// Evaluators for tests that do not list their own
    pub fn with_default_evaluators(mut self, evaluators: Vec<String>) -> Self {
        self.default_evaluators = evaluators;
        self
    }

    /// Load the agent configuration and the recorded conversation.
    ///
    /// Missing agent or tool configuration is tolerated; evaluators handle
    /// its absence.
    ///
    /// # Errors
    ///
    /// Returns [`RepriseError::DataUnavailable`] if the conversation or its
    /// trigger message cannot be resolved.
    pub async fn get_data(&self, agent_id: &str, conversation_id: &str) -> Result<TestData> {
        let agent_config = self
            .platform
            .load_agent_config(agent_id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(%agent_id, error = %e, "Failed to load agent config");
                None
            });
        let agent_tools_config = self
            .platform
            .load_agent_tools_config(agent_id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(%agent_id, error = %e, "Failed to load agent tools config");
                None
            });

        let original_actions = match self
            .platform
            .load_conversation_actions(conversation_id, agent_id)
            .await
        {
            Ok(Some(actions)) if !actions.is_empty() => actions,
            Ok(_) => {
                return Err(RepriseError::DataUnavailable(format!(
                    "conversation {} has no actions",
                    conversation_id
                )));
            }
            Err(e) => {
                return Err(RepriseError::DataUnavailable(format!(
                    "failed to load conversation {}: {}",
                    conversation_id, e
                )));
            }
        };

        let trigger_message = extract_trigger_message(&original_actions).ok_or_else(|| {
            RepriseError::DataUnavailable(format!(
                "no trigger message in conversation {}",
                conversation_id
            ))
        })?;

        Ok(TestData {
            agent_config,
            agent_tools_config,
            original_actions,
            trigger_message,
        })
    }

    /// Build the simulation for a test: manual overrides when given,
    /// otherwise every recorded tool run.
    ///
    /// Under [`UnrunToolPolicy::FailClosed`] the agent's tools config names
    /// the tools to fail; without it the build is flagged
    /// `fail_closed_unenforced`.
    pub fn build_simulation(
        &self,
        data: &TestData,
        overrides: Option<&[ManualOverride]>,
    ) -> SimulationBuild {
        let mut builder = SimulationConfigBuilder::new().with_unrun_tool_policy(self.unrun_tools);
        if let Some(tools) = &data.agent_tools_config {
            builder = builder.with_tools_config(tools);
        }

        let mut build = match overrides {
            Some(overrides) => SimulationBuild {
                config: builder.from_manual_overrides(overrides),
                ..SimulationBuild::default()
            },
            None => builder.from_actions(&data.original_actions),
        };

        if self.unrun_tools == UnrunToolPolicy::FailClosed && data.agent_tools_config.is_none() {
            tracing::warn!(
                "Fail-closed requested but the agent's tools config is unavailable; tools without a recorded run will execute live"
            );
            build.fail_closed_unenforced = true;
        }
        build
    }

    /// Run every evaluator over `actions` and archive the run under `label`.
    ///
    /// A failing or panicking evaluator contributes `evaluation_error = 1.0`
    /// and does not stop the others.
    pub fn run_evaluations(
        &self,
        evaluator_names: &[String],
        actions: &[Action],
        data: &TestData,
        metrics: &mut MetricsCollector,
        label: &str,
    ) {
        tracing::info!(%label, evaluators = ?evaluator_names, "Evaluating conversation");
        metrics.start_run();

        for name in evaluator_names {
            let evaluator = match self.registry.load(name) {
                Ok(evaluator) => evaluator,
                Err(e) => {
                    tracing::warn!(evaluator = %name, error = %e, "Skipping evaluator");
                    continue;
                }
            };
            let scores = evaluate_isolated(evaluator.as_ref(), actions, data, label);
            metrics.add_result(evaluator.name(), scores);
        }

        metrics.end_run(label);
    }

    /// Replay `trigger_text` under `simulation`
    pub async fn run_simulation_conversation(
        &self,
        agent_id: &str,
        trigger_text: &str,
        simulation: &SimulationConfig,
    ) -> Result<ReplayOutcome> {
        let mut orchestrator =
            ReplayOrchestrator::new(self.platform.as_ref(), agent_id).with_polling(self.polling);
        orchestrator.replay(trigger_text, simulation).await
    }

    /// Run one test.
    ///
    /// Unavailable original data yields [`TestOutcome::Skipped`]; replay
    /// failures are recorded on the report.
    pub async fn run_test(&self, case: &TestCase) -> Result<TestOutcome> {
        let test_name = case.test_name();
        let span = tracing::info_span!("test", name = %test_name);
        self.execute(case, test_name).instrument(span).await
    }

    async fn execute(&self, case: &TestCase, test_name: String) -> Result<TestOutcome> {
        tracing::info!(agent_id = %case.agent_id, conversation_id = %case.conversation_id, "Running test");

        let data = match self.get_data(&case.agent_id, &case.conversation_id).await {
            Ok(data) => data,
            Err(RepriseError::DataUnavailable(reason)) => {
                tracing::warn!(%reason, "Skipping test");
                return Ok(TestOutcome::Skipped { test_name, reason });
            }
            Err(e) => return Err(e),
        };

        let evaluators = if case.evaluators.is_empty() {
            &self.default_evaluators
        } else {
            &case.evaluators
        };

        let simulation = self.build_simulation(&data, case.overrides.as_deref());
        tracing::info!(
            tools = simulation.config.tool_count(),
            entries = simulation.config.entry_count(),
            skipped = simulation.skipped.len(),
            "Built simulation config"
        );

        let mut metrics = MetricsCollector::new();
        self.run_evaluations(evaluators, &data.original_actions, &data, &mut metrics, ORIGINAL_LABEL);

        let outcome = self
            .run_simulation_conversation(&case.agent_id, &data.trigger_message.text, &simulation.config)
            .await?;

        match outcome.actions() {
            Some(replayed) => {
                tracing::info!(actions = replayed.len(), "Replay completed");
                self.run_evaluations(evaluators, replayed, &data, &mut metrics, REPLAYED_LABEL);
            }
            None => {
                tracing::error!(outcome = %outcome, "Replay failed");
                metrics.start_run();
                metrics.add_result(
                    FRAMEWORK_EVALUATOR,
                    Scores::from([(RUN_STATUS_METRIC.to_string(), 0.0)]),
                );
                metrics.end_run(test_name.as_str());
            }
        }

        let comparison = match (
            metrics.latest_metrics(ORIGINAL_LABEL),
            metrics.latest_metrics(REPLAYED_LABEL),
        ) {
            (Some(original), Some(replayed)) => Some(compare(original, replayed)),
            _ => None,
        };
        if let Some(comparison) = &comparison {
            tracing::info!(assessment = %comparison.overall_assessment, "Compared runs");
        }

        Ok(TestOutcome::Finished(TestReport {
            test_name,
            agent_id: case.agent_id.clone(),
            original_conversation_id: case.conversation_id.clone(),
            replayed_conversation_id: outcome.conversation_id().map(str::to_string),
            evaluations: metrics.archived_runs().clone(),
            summaries: metrics.get_all_test_summaries(),
            comparison,
            replay_failure: ReplayFailure::from_outcome(&outcome),
            simulated_tools: simulation.config.tool_count(),
            skipped_tool_runs: simulation.skipped.len(),
            fail_closed_unenforced: simulation.fail_closed_unenforced,
        }))
    }

    /// Run every case of a suite in order
    pub async fn run_suite(&self, suite: &TestSuite) -> Result<Vec<TestOutcome>> {
        let mut outcomes = Vec::with_capacity(suite.tests.len());
        for case in suite.resolved_cases() {
            outcomes.push(self.run_test(&case).await?);
        }
        Ok(outcomes)
    }
}

// Panics are only caught under the default `panic = "unwind"` strategy
fn evaluate_isolated(
    evaluator: &dyn Evaluator,
    actions: &[Action],
    data: &TestData,
    label: &str,
) -> Scores {
    let result = catch_unwind(AssertUnwindSafe(|| {
        evaluator.evaluate(
            actions,
            data.agent_config.as_ref(),
            data.agent_tools_config.as_deref(),
        )
    }));

    match result {
        Ok(Ok(scores)) => scores,
        Ok(Err(e)) => {
            tracing::error!(evaluator = evaluator.name(), %label, error = %e, "Evaluator failed");
            evaluation_error_scores()
        }
        Err(_) => {
            tracing::error!(evaluator = evaluator.name(), %label, "Evaluator panicked");
            evaluation_error_scores()
        }
    }
}
