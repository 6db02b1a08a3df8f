//! Replay state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::{DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_SECS};
use crate::conversation::{Action, ConversationState};
use crate::error::{RepriseError, Result};
use crate::platform::AgentPlatform;
use crate::simulation::SimulationConfig;

/// Fixed-interval polling budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Wait between listing calls
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Maximum number of listing calls
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

impl PollingConfig {
    /// Create a polling budget
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

/// Where a replay attempt currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPhase {
    NotStarted,
    Triggering,
    Polling,
    Completed,
    TriggerFailed,
    PollTimeout,
    /// Reached a terminal lifecycle state but the log could not be loaded
    FetchFailed,
}

impl ReplayPhase {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::TriggerFailed | Self::PollTimeout | Self::FetchFailed
        )
    }
}

/// Result of one replay attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome {
    /// The replay reached a terminal lifecycle state and its log was fetched
    Completed {
        conversation_id: String,
        final_state: ConversationState,
        actions: Vec<Action>,
    },
    /// The replay could not be started
    TriggerFailed { reason: String },
    /// The replay stayed active (or unlisted) for the whole attempt budget
    PollTimeout {
        conversation_id: String,
        attempts: u32,
    },
    /// The replay finished but its log could not be fetched
    FetchFailed {
        conversation_id: String,
        reason: String,
    },
}

impl ReplayOutcome {
    /// Replayed conversation id, once one was assigned
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Self::Completed { conversation_id, .. }
            | Self::PollTimeout { conversation_id, .. }
            | Self::FetchFailed { conversation_id, .. } => Some(conversation_id),
            Self::TriggerFailed { .. } => None,
        }
    }

    /// Replayed actions, when the replay completed
    pub fn actions(&self) -> Option<&[Action]> {
        match self {
            Self::Completed { actions, .. } => Some(actions),
            _ => None,
        }
    }

    /// Diagnostic for unsuccessful outcomes
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Completed { .. } => None,
            Self::TriggerFailed { reason } => Some(format!("Trigger failed: {}", reason)),
            Self::PollTimeout {
                conversation_id,
                attempts,
            } => Some(format!(
                "Polling failed: conversation {} still active after {} attempts",
                conversation_id, attempts
            )),
            Self::FetchFailed {
                conversation_id,
                reason,
            } => Some(format!(
                "Polling failed: actions of conversation {} unavailable: {}",
                conversation_id, reason
            )),
        }
    }
}

impl fmt::Display for ReplayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed {
                conversation_id,
                final_state,
                actions,
            } => write!(
                f,
                "conversation {} finished in state {} with {} actions",
                conversation_id,
                final_state,
                actions.len()
            ),
            other => f.write_str(&other.failure_reason().unwrap_or_default()),
        }
    }
}

/// Drives one replay attempt.
///
/// Not reentrant: `replay` runs once per instance. Concurrent replays need
/// separate orchestrators.
pub struct ReplayOrchestrator<'a> {
    platform: &'a dyn AgentPlatform,
    agent_id: String,
    polling: PollingConfig,
    phase: ReplayPhase,
}

impl<'a> ReplayOrchestrator<'a> {
    /// Create an orchestrator for `agent_id` with the default polling budget
    pub fn new(platform: &'a dyn AgentPlatform, agent_id: impl Into<String>) -> Self {
        Self {
            platform,
            agent_id: agent_id.into(),
            polling: PollingConfig::default(),
            phase: ReplayPhase::NotStarted,
        }
    }

    /// Override the polling budget
    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    /// Current phase
    pub fn phase(&self) -> ReplayPhase {
        self.phase
    }

    /// Trigger a replay and wait for it to finish.
    ///
    /// Trigger and polling failures are reported as outcomes, not errors.
    ///
    /// # Errors
    ///
    /// Returns an error if this orchestrator already ran.
    pub async fn replay(
        &mut self,
        trigger_text: &str,
        simulation: &SimulationConfig,
    ) -> Result<ReplayOutcome> {
        if self.phase != ReplayPhase::NotStarted {
            return Err(RepriseError::Replay(format!(
                "orchestrator already used (phase {:?})",
                self.phase
            )));
        }

        self.phase = ReplayPhase::Triggering;
        let conversation_id = match self.trigger(trigger_text, simulation).await {
            Ok(id) => id,
            Err(reason) => {
                tracing::error!(agent_id = %self.agent_id, %reason, "Replay trigger failed");
                self.phase = ReplayPhase::TriggerFailed;
                return Ok(ReplayOutcome::TriggerFailed { reason });
            }
        };

        self.phase = ReplayPhase::Polling;
        Ok(self.await_completion(conversation_id).await)
    }

    async fn trigger(
        &self,
        trigger_text: &str,
        simulation: &SimulationConfig,
    ) -> std::result::Result<String, String> {
        tracing::info!(
            agent_id = %self.agent_id,
            overridden_tools = simulation.tool_count(),
            "Triggering replay"
        );
        match self
            .platform
            .trigger_replay(&self.agent_id, trigger_text, simulation)
            .await
        {
            Ok(Some(id)) if !id.is_empty() => {
                tracing::info!(conversation_id = %id, "Replay triggered");
                Ok(id)
            }
            Ok(_) => Err("response carried no conversation id".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn await_completion(&mut self, conversation_id: String) -> ReplayOutcome {
        let max_attempts = self.polling.max_attempts;

        for attempt in 1..=max_attempts {
            tracing::debug!(%conversation_id, attempt, max_attempts, "Polling replay");

            match self.platform.list_conversations(&self.agent_id).await {
                Ok(conversations) => {
                    let state = conversations
                        .into_iter()
                        .find(|c| c.conversation_id == conversation_id)
                        .map(|c| c.state);
                    match state {
                        Some(state) if !state.is_active() => {
                            tracing::info!(%conversation_id, %state, attempt, "Replay finished");
                            let outcome = self.fetch_actions(conversation_id, state).await;
                            self.phase = match outcome {
                                ReplayOutcome::Completed { .. } => ReplayPhase::Completed,
                                _ => ReplayPhase::FetchFailed,
                            };
                            return outcome;
                        }
                        Some(state) => {
                            tracing::debug!(%conversation_id, %state, "Replay still active");
                        }
                        None => {
                            tracing::debug!(%conversation_id, "Replay not listed yet");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(%conversation_id, attempt, error = %e, "Listing conversations failed");
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.polling.interval).await;
            }
        }

        tracing::error!(%conversation_id, max_attempts, "Replay did not finish within the polling budget");
        self.phase = ReplayPhase::PollTimeout;
        ReplayOutcome::PollTimeout {
            conversation_id,
            attempts: max_attempts,
        }
    }

    async fn fetch_actions(
        &self,
        conversation_id: String,
        final_state: ConversationState,
    ) -> ReplayOutcome {
        match self
            .platform
            .load_conversation_actions(&conversation_id, &self.agent_id)
            .await
        {
            Ok(Some(actions)) => ReplayOutcome::Completed {
                conversation_id,
                final_state,
                actions,
            },
            Ok(None) => ReplayOutcome::FetchFailed {
                conversation_id,
                reason: "no actions returned".to_string(),
            },
            Err(e) => ReplayOutcome::FetchFailed {
                conversation_id,
                reason: e.to_string(),
            },
        }
    }
}
