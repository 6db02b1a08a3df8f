//! In-memory agent platform with scripted responses
//!
//! Lets the whole harness run offline: recorded conversations are served
//! from memory, replays return scripted conversation ids, and listing calls
//! walk through a scripted sequence of lifecycle states. Regenerate requests
//! are recorded rather than executed.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::{AgentConfig, AgentPlatform, ToolConfig};
use crate::conversation::{Action, ConversationState, ConversationSummary};
use crate::error::{RepriseError, Result};
use crate::simulation::SimulationConfig;

/// Scripted answer to one `trigger_replay` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerScript {
    /// The platform accepts and returns this conversation id
    Accept(String),
    /// The platform answers without a conversation id
    NoId,
    /// The call fails with this message
    Fail(String),
}

/// A replay request the platform received
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredReplay {
    /// Agent the replay was sent to
    pub agent_id: String,
    /// Trigger text
    pub trigger_text: String,
    /// Simulation config the replay ran under
    pub simulation: SimulationConfig,
}

/// A regenerate request the platform received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetriggerRequest {
    /// Agent that owns the conversation
    pub agent_id: String,
    /// Conversation being resumed
    pub conversation_id: String,
    /// Message the agent regenerates from
    pub message_id: String,
}

#[derive(Default)]
struct Script {
    agents: HashMap<String, AgentConfig>,
    tools: HashMap<String, Vec<ToolConfig>>,
    conversations: HashMap<String, Vec<Action>>,
    broken_conversations: HashSet<String>,
    // agent_id -> conversation_id -> remaining states; the last state sticks
    listings: BTreeMap<String, BTreeMap<String, VecDeque<ConversationState>>>,
    triggers: VecDeque<TriggerScript>,
    list_failures: usize,
    triggered: Vec<TriggeredReplay>,
    // agent_id -> tool_id -> conversations where a run of the tool failed
    tool_failures: BTreeMap<String, BTreeMap<String, Vec<ConversationSummary>>>,
    broken_retriggers: HashSet<String>,
    retriggered: Vec<RetriggerRequest>,
}

/// Agent platform backed by in-memory scripts
#[derive(Default)]
pub struct ScriptedPlatform {
    script: Mutex<Script>,
    trigger_calls: AtomicUsize,
    list_calls: AtomicUsize,
    retrigger_calls: AtomicUsize,
}

impl ScriptedPlatform {
    /// Create an empty platform
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `config` for `agent_id`
    pub fn with_agent(mut self, agent_id: impl Into<String>, config: AgentConfig) -> Self {
        self.script.get_mut().agents.insert(agent_id.into(), config);
        self
    }

    /// Serve `tools` as the agent's tool configs
    pub fn with_tools(mut self, agent_id: impl Into<String>, tools: Vec<ToolConfig>) -> Self {
        self.script.get_mut().tools.insert(agent_id.into(), tools);
        self
    }

    /// Serve `actions` for a conversation
    pub fn with_conversation(
        mut self,
        conversation_id: impl Into<String>,
        actions: Vec<Action>,
    ) -> Self {
        self.script
            .get_mut()
            .conversations
            .insert(conversation_id.into(), actions);
        self
    }

    /// Make loading a conversation fail with a platform error
    pub fn with_broken_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.script
            .get_mut()
            .broken_conversations
            .insert(conversation_id.into());
        self
    }

    /// List `conversation_id` under `agent_id`, reporting `states` on
    /// successive listing calls. The last state repeats once reached.
    pub fn with_states(
        mut self,
        agent_id: impl Into<String>,
        conversation_id: impl Into<String>,
        states: impl IntoIterator<Item = ConversationState>,
    ) -> Self {
        self.script
            .get_mut()
            .listings
            .entry(agent_id.into())
            .or_default()
            .insert(conversation_id.into(), states.into_iter().collect());
        self
    }

    /// Queue the answer to the next unanswered `trigger_replay` call
    pub fn with_trigger(mut self, response: TriggerScript) -> Self {
        self.script.get_mut().triggers.push_back(response);
        self
    }

    /// Fail the next `count` listing calls
    pub fn with_list_failures(mut self, count: usize) -> Self {
        self.script.get_mut().list_failures = count;
        self
    }

    /// Report `conversation` as one where a run of `tool_id` failed
    pub fn with_tool_failure(
        mut self,
        agent_id: impl Into<String>,
        tool_id: impl Into<String>,
        conversation: ConversationSummary,
    ) -> Self {
        self.script
            .get_mut()
            .tool_failures
            .entry(agent_id.into())
            .or_default()
            .entry(tool_id.into())
            .or_default()
            .push(conversation);
        self
    }

    /// Make regenerate requests for a conversation fail with a platform error
    pub fn with_broken_retrigger(mut self, conversation_id: impl Into<String>) -> Self {
        self.script
            .get_mut()
            .broken_retriggers
            .insert(conversation_id.into());
        self
    }

    /// Number of `trigger_replay` calls received
    pub fn trigger_calls(&self) -> usize {
        self.trigger_calls.load(Ordering::SeqCst)
    }

    /// Number of `list_conversations` calls received
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `retrigger_after_message` calls received
    pub fn retrigger_calls(&self) -> usize {
        self.retrigger_calls.load(Ordering::SeqCst)
    }

    /// Regenerate requests accepted so far, in order
    pub async fn retriggered(&self) -> Vec<RetriggerRequest> {
        self.script.lock().await.retriggered.clone()
    }

    /// Replay requests received so far, in order
    pub async fn triggered(&self) -> Vec<TriggeredReplay> {
        self.script.lock().await.triggered.clone()
    }
}

#[async_trait]
impl AgentPlatform for ScriptedPlatform {
    async fn load_agent_config(&self, agent_id: &str) -> Result<Option<AgentConfig>> {
        Ok(self.script.lock().await.agents.get(agent_id).cloned())
    }

    async fn load_agent_tools_config(&self, agent_id: &str) -> Result<Option<Vec<ToolConfig>>> {
        Ok(self.script.lock().await.tools.get(agent_id).cloned())
    }

    async fn load_conversation_actions(
        &self,
        conversation_id: &str,
        _agent_id: &str,
    ) -> Result<Option<Vec<Action>>> {
        let script = self.script.lock().await;
        if script.broken_conversations.contains(conversation_id) {
            return Err(RepriseError::Platform(format!(
                "conversation {} could not be loaded",
                conversation_id
            )));
        }
        Ok(script.conversations.get(conversation_id).cloned())
    }

    async fn trigger_replay(
        &self,
        agent_id: &str,
        trigger_text: &str,
        simulation: &SimulationConfig,
    ) -> Result<Option<String>> {
        self.trigger_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().await;
        script.triggered.push(TriggeredReplay {
            agent_id: agent_id.to_string(),
            trigger_text: trigger_text.to_string(),
            simulation: simulation.clone(),
        });

        match script.triggers.pop_front() {
            Some(TriggerScript::Accept(id)) => Ok(Some(id)),
            Some(TriggerScript::NoId) | None => Ok(None),
            Some(TriggerScript::Fail(message)) => Err(RepriseError::Platform(message)),
        }
    }

    async fn list_conversations(&self, agent_id: &str) -> Result<Vec<ConversationSummary>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().await;
        if script.list_failures > 0 {
            script.list_failures -= 1;
            return Err(RepriseError::Platform("listing unavailable".to_string()));
        }

        let Some(listing) = script.listings.get_mut(agent_id) else {
            return Ok(Vec::new());
        };
        let summaries = listing
            .iter_mut()
            .filter_map(|(conversation_id, states)| {
                let state = if states.len() > 1 {
                    states.pop_front()?
                } else {
                    states.front()?.clone()
                };
                Some(ConversationSummary::new(conversation_id.clone(), state))
            })
            .collect();
        Ok(summaries)
    }

    async fn failed_conversations_for_tool(
        &self,
        agent_id: &str,
        tool_id: &str,
    ) -> Result<Vec<ConversationSummary>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().await;
        Ok(script
            .tool_failures
            .get(agent_id)
            .and_then(|tools| tools.get(tool_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn retrigger_after_message(
        &self,
        agent_id: &str,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<()> {
        self.retrigger_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().await;
        if script.broken_retriggers.contains(conversation_id) {
            return Err(RepriseError::PlatformStatus {
                status: 500,
                body: format!("cannot regenerate {}", conversation_id),
            });
        }
        script.retriggered.push(RetriggerRequest {
            agent_id: agent_id.to_string(),
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }
}
