//! Agent platform collaborators
//!
//! The harness never talks to the vendor directly; it goes through the
//! [`AgentPlatform`] trait. [`HttpPlatform`] is the REST implementation and
//! [`ScriptedPlatform`] an in-memory one for tests and dry runs.

mod http;
mod scripted;

pub use http::{HttpPlatform, PlatformCredentials};
pub use scripted::{RetriggerRequest, ScriptedPlatform, TriggerScript, TriggeredReplay};

use async_trait::async_trait;
use serde_json::Value;

use crate::conversation::{Action, ConversationSummary};
use crate::error::Result;
use crate::simulation::SimulationConfig;

/// Agent configuration as returned by the platform
pub type AgentConfig = Value;

/// One tool configuration as returned by the platform
pub type ToolConfig = Value;

/// Capabilities the harness consumes from the agent platform.
///
/// `Ok(None)` means the platform answered but has nothing for the request;
/// `Err` is a transport or application failure.
#[async_trait]
pub trait AgentPlatform: Send + Sync {
    /// Load the agent's configuration
    async fn load_agent_config(&self, agent_id: &str) -> Result<Option<AgentConfig>>;

    /// Load the configurations of every tool attached to the agent
    async fn load_agent_tools_config(&self, agent_id: &str) -> Result<Option<Vec<ToolConfig>>>;

    /// Load a conversation's actions, sorted ascending by insertion time
    async fn load_conversation_actions(
        &self,
        conversation_id: &str,
        agent_id: &str,
    ) -> Result<Option<Vec<Action>>>;

    /// Start a new conversation with tool behaviour pinned by `simulation`.
    /// Returns the new conversation's id.
    async fn trigger_replay(
        &self,
        agent_id: &str,
        trigger_text: &str,
        simulation: &SimulationConfig,
    ) -> Result<Option<String>>;

    /// List the agent's conversations with their lifecycle states
    async fn list_conversations(&self, agent_id: &str) -> Result<Vec<ConversationSummary>>;

    /// Conversations whose state marks them as failed
    async fn failed_conversations(&self, agent_id: &str) -> Result<Vec<ConversationSummary>> {
        let conversations = self.list_conversations(agent_id).await?;
        Ok(conversations
            .into_iter()
            .filter(|c| c.state.is_failure())
            .collect())
    }

    /// Conversations in which a run of `tool_id` failed at least once
    async fn failed_conversations_for_tool(
        &self,
        agent_id: &str,
        tool_id: &str,
    ) -> Result<Vec<ConversationSummary>>;

    /// Resume an existing conversation by regenerating from `message_id`
    async fn retrigger_after_message(
        &self,
        agent_id: &str,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<()>;
}
