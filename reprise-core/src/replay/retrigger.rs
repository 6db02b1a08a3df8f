//! Re-running failed conversations in place

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::conversation::{regenerate_message_id, ConversationSummary};
use crate::error::Result;
use crate::platform::AgentPlatform;

/// Default wait between two regenerate requests
pub const DEFAULT_RETRIGGER_PAUSE_SECS: u64 = 20;

/// What happened to one failed conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetriggerOutcome {
    /// A regenerate request was accepted
    Retriggered {
        conversation_id: String,
        message_id: String,
    },
    /// The log holds no errored tool run with a message to regenerate from
    NoErroredToolRun { conversation_id: String },
    /// The log could not be loaded or the platform refused the request
    Failed {
        conversation_id: String,
        reason: String,
    },
}

impl RetriggerOutcome {
    /// Conversation the outcome belongs to
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::Retriggered { conversation_id, .. }
            | Self::NoErroredToolRun { conversation_id }
            | Self::Failed { conversation_id, .. } => conversation_id,
        }
    }

    /// Whether a regenerate request was sent and accepted
    pub fn is_retriggered(&self) -> bool {
        matches!(self, Self::Retriggered { .. })
    }
}

/// Resume every failed conversation of an agent from just before its last
/// errored tool run.
///
/// With `tool_id`, only conversations where that tool failed are picked;
/// otherwise those whose lifecycle state is a failure. Regenerate requests
/// are spaced by `pause`. A failure on one conversation is recorded and the
/// batch continues.
///
/// # Errors
///
/// Returns an error only when the failed conversations cannot be listed.
pub async fn retrigger_failed_conversations(
    platform: &dyn AgentPlatform,
    agent_id: &str,
    tool_id: Option<&str>,
    pause: Duration,
) -> Result<Vec<RetriggerOutcome>> {
    let failed = match tool_id {
        Some(tool_id) => platform.failed_conversations_for_tool(agent_id, tool_id).await?,
        None => platform.failed_conversations(agent_id).await?,
    };
    tracing::info!(%agent_id, tool_id = ?tool_id, conversations = failed.len(), "Retriggering failed conversations");

    let mut outcomes = Vec::with_capacity(failed.len());
    let mut sent = false;
    for conversation in &failed {
        let message_id = match regenerate_point(platform, agent_id, conversation).await {
            Ok(Some(message_id)) => message_id,
            Ok(None) => {
                tracing::info!(conversation_id = %conversation.conversation_id, "No errored tool run to regenerate from");
                outcomes.push(RetriggerOutcome::NoErroredToolRun {
                    conversation_id: conversation.conversation_id.clone(),
                });
                continue;
            }
            Err(reason) => {
                outcomes.push(failed_outcome(conversation, reason));
                continue;
            }
        };

        if sent {
            tokio::time::sleep(pause).await;
        }
        sent = true;

        let outcome = match platform
            .retrigger_after_message(agent_id, &conversation.conversation_id, &message_id)
            .await
        {
            Ok(()) => {
                tracing::info!(conversation_id = %conversation.conversation_id, %message_id, "Conversation retriggered");
                RetriggerOutcome::Retriggered {
                    conversation_id: conversation.conversation_id.clone(),
                    message_id,
                }
            }
            Err(e) => failed_outcome(conversation, format!("regenerate request failed: {}", e)),
        };
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

async fn regenerate_point(
    platform: &dyn AgentPlatform,
    agent_id: &str,
    conversation: &ConversationSummary,
) -> std::result::Result<Option<String>, String> {
    match platform
        .load_conversation_actions(&conversation.conversation_id, agent_id)
        .await
    {
        Ok(Some(actions)) => Ok(regenerate_message_id(&actions)),
        Ok(None) => Err("conversation log unavailable".to_string()),
        Err(e) => Err(format!("conversation log unavailable: {}", e)),
    }
}

fn failed_outcome(conversation: &ConversationSummary, reason: String) -> RetriggerOutcome {
    tracing::warn!(conversation_id = %conversation.conversation_id, %reason, "Retrigger failed");
    RetriggerOutcome::Failed {
        conversation_id: conversation.conversation_id.clone(),
        reason,
    }
}
