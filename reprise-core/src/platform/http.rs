//! REST implementation of the agent platform

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use super::{AgentConfig, AgentPlatform, ToolConfig};
use crate::config::PlatformConfig;
use crate::conversation::{Action, ConversationSummary};
use crate::error::{RepriseError, Result};
use crate::json;
use crate::simulation::SimulationConfig;

const PAGE_SIZE: u64 = 50_000;

/// Project-scoped credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct PlatformCredentials {
    /// Region identifier, part of the default host name
    pub region_id: String,
    /// Project identifier
    pub project_id: String,
    /// Project API key
    pub api_key: String,
}

impl PlatformCredentials {
    /// Create credentials
    pub fn new(
        region_id: impl Into<String>,
        project_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            region_id: region_id.into(),
            project_id: project_id.into(),
            api_key: api_key.into(),
        }
    }

    /// Value of the `Authorization` header
    fn authorization(&self) -> String {
        format!("{}:{}", self.project_id, self.api_key)
    }

    /// Default API base URL for the region
    pub fn default_base_url(&self) -> String {
        format!("https://api-{}.stack.tryrelevance.com/latest", self.region_id)
    }
}

impl std::fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("region_id", &self.region_id)
            .field("project_id", &self.project_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Agent platform reached over HTTPS
pub struct HttpPlatform {
    client: reqwest::Client,
    credentials: PlatformCredentials,
    base_url: String,
}

impl HttpPlatform {
    /// Create a client against the region's default base URL
    pub fn new(credentials: PlatformCredentials) -> Self {
        let base_url = credentials.default_base_url();
        Self {
            client: reqwest::Client::new(),
            credentials,
            base_url,
        }
    }

    /// Create a client against a custom base URL (proxies, staging)
    pub fn with_base_url(credentials: PlatformCredentials, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from the `platform` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client cannot be built.
    pub fn from_config(config: &PlatformConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            RepriseError::Configuration("platform.api_key is not set".to_string())
        })?;
        let credentials =
            PlatformCredentials::new(&config.region_id, &config.project_id, api_key);
        let client = build_client(config.request_timeout)?;
        let base_url = config
            .base_url
            .clone()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| credentials.default_base_url());

        Ok(Self {
            client,
            credentials,
            base_url,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .header("Authorization", self.credentials.authorization())
            .send()
            .await
            .map_err(|e| RepriseError::Platform(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RepriseError::PlatformStatus {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| RepriseError::Platform(format!("Failed to parse response: {}", e)))
    }
}

impl HttpPlatform {
    async fn list_matching(
        &self,
        agent_id: &str,
        event_filter: Option<Value>,
    ) -> Result<Vec<ConversationSummary>> {
        let filters = serde_json::to_string(&json!([exact_match("agent_id", agent_id)]))?;
        let page_size = PAGE_SIZE.to_string();
        let mut query = vec![("page_size", page_size), ("filters", filters)];
        if let Some(event_filter) = event_filter {
            query.push(("event_logs_filters", serde_json::to_string(&json!([event_filter]))?));
        }

        let response = self
            .send(
                self.client
                    .get(self.url("agents/conversations/list"))
                    .query(&query),
            )
            .await?;
        Ok(parse_conversation_list(&response))
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RepriseError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

fn exact_match(field: &str, value: &str) -> Value {
    json!({
        "field": field,
        "condition": "==",
        "condition_value": value,
        "filter_type": "exact_match",
        "case_insensitive": false,
    })
}

/// Pick the agent whose `agent_id` matches from an `agents/list` response
pub(crate) fn select_agent(response: &Value, agent_id: &str) -> Option<AgentConfig> {
    response
        .get("results")?
        .as_array()?
        .iter()
        .find(|agent| json::lookup_str(agent, "agent_id") == Some(agent_id))
        .cloned()
}

/// Decode a `tasks/{id}/view` response into actions sorted by insertion time
pub(crate) fn parse_actions(response: Value) -> Result<Option<Vec<Action>>> {
    let Some(results) = response.get("results").cloned() else {
        return Ok(None);
    };
    let mut actions: Vec<Action> = serde_json::from_value(results)?;
    // Stable sort keeps vendor order for equal timestamps
    actions.sort_by(|a, b| {
        a.insert_timestamp
            .as_deref()
            .unwrap_or_default()
            .cmp(b.insert_timestamp.as_deref().unwrap_or_default())
    });
    Ok(Some(actions))
}

/// Decode a `conversations/list` response
pub(crate) fn parse_conversation_list(response: &Value) -> Vec<ConversationSummary> {
    response
        .get("results")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(ConversationSummary::from_listing_entry)
                .collect()
        })
        .unwrap_or_default()
}

/// Event-log filter matching conversations where `tool_id` failed at least once
pub(crate) fn tool_failure_filter(tool_id: &str) -> Value {
    json!({
        "event_value": tool_id,
        "event_type": "tool_runs_failed",
        "min_count": 1,
        "max_count": 10,
        "comparison_type": "gte",
    })
}

/// Build the body of an `agents/trigger` request that regenerates an existing conversation
pub(crate) fn retrigger_payload(agent_id: &str, conversation_id: &str, message_id: &str) -> Value {
    json!({
        "action": "regenerate",
        "regenerate_message_id": message_id,
        "agent_id": agent_id,
        "conversation_id": conversation_id,
    })
}

/// Build the body of an `agents/trigger` request
pub(crate) fn trigger_payload(
    agent_id: &str,
    trigger_text: &str,
    simulation: &SimulationConfig,
) -> Result<Value> {
    Ok(json!({
        "agent_id": agent_id,
        "message": {
            "role": "user",
            "content": trigger_text,
        },
        "debug": true,
        "debug_mode_config": simulation.to_value()?,
    }))
}

#[async_trait]
impl AgentPlatform for HttpPlatform {
    async fn load_agent_config(&self, agent_id: &str) -> Result<Option<AgentConfig>> {
        tracing::debug!(%agent_id, "Fetching agent config");
        let body = json!({
            "page_size": PAGE_SIZE,
            "filters": [exact_match("project", &self.credentials.project_id)],
        });
        let response = self
            .send(self.client.post(self.url("agents/list")).json(&body))
            .await?;
        Ok(select_agent(&response, agent_id))
    }

    async fn load_agent_tools_config(&self, agent_id: &str) -> Result<Option<Vec<ToolConfig>>> {
        tracing::debug!(%agent_id, "Fetching agent tools config");
        let response = self
            .send(
                self.client
                    .post(self.url(&format!("agents/{}/tools/list", agent_id)))
                    .json(&json!({})),
            )
            .await?;
        Ok(response
            .get("chains")
            .and_then(Value::as_array)
            .cloned())
    }

    async fn load_conversation_actions(
        &self,
        conversation_id: &str,
        agent_id: &str,
    ) -> Result<Option<Vec<Action>>> {
        tracing::debug!(%conversation_id, %agent_id, "Fetching conversation actions");
        let url = self.url(&format!(
            "agents/{}/tasks/{}/view",
            agent_id, conversation_id
        ));
        let response = self
            .send(
                self.client
                    .post(url)
                    .query(&[("full_history", "true")])
                    .json(&json!({})),
            )
            .await?;
        parse_actions(response)
    }

    async fn trigger_replay(
        &self,
        agent_id: &str,
        trigger_text: &str,
        simulation: &SimulationConfig,
    ) -> Result<Option<String>> {
        let payload = trigger_payload(agent_id, trigger_text, simulation)?;
        let response = self
            .send(self.client.post(self.url("agents/trigger")).json(&payload))
            .await?;
        Ok(json::lookup_str(&response, "conversation_id").map(str::to_string))
    }

    async fn list_conversations(&self, agent_id: &str) -> Result<Vec<ConversationSummary>> {
        self.list_matching(agent_id, None).await
    }

    async fn failed_conversations_for_tool(
        &self,
        agent_id: &str,
        tool_id: &str,
    ) -> Result<Vec<ConversationSummary>> {
        tracing::debug!(%agent_id, %tool_id, "Listing conversations with failed tool runs");
        self.list_matching(agent_id, Some(tool_failure_filter(tool_id)))
            .await
    }

    async fn retrigger_after_message(
        &self,
        agent_id: &str,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<()> {
        let payload = retrigger_payload(agent_id, conversation_id, message_id);
        self.send(self.client.post(self.url("agents/trigger")).json(&payload))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::conversation::ConversationState;
    use crate::simulation::{OverrideEntry, RunIndex};

    #[test]
    fn test_default_base_url_and_auth() {
        let creds = PlatformCredentials::new("f1db6c", "proj", "secret");
        assert_eq!(
            creds.default_base_url(),
            "https://api-f1db6c.stack.tryrelevance.com/latest"
        );
        assert_eq!(creds.authorization(), "proj:secret");
        assert!(!format!("{:?}", creds).contains("secret"));
    }

    #[test]
    fn test_custom_base_url_trims_trailing_slash() {
        let platform = HttpPlatform::with_base_url(
            PlatformCredentials::new("r", "p", "k"),
            "http://localhost:8080/latest/",
        );
        assert_eq!(platform.url("agents/trigger"), "http://localhost:8080/latest/agents/trigger");
    }

    #[test]
    fn test_select_agent() {
        let response = json!({"results": [
            {"agent_id": "a1", "system_prompt": "one"},
            {"agent_id": "a2", "system_prompt": "two"},
        ]});
        let agent = select_agent(&response, "a2").unwrap();
        assert_eq!(agent["system_prompt"], "two");
        assert!(select_agent(&response, "a3").is_none());
    }

    #[test]
    fn test_parse_actions_sorts_by_insert_date() {
        let response = json!({"results": [
            {"item_id": "b", "content": {}, "insert_date_": "2024-05-01T10:00:02Z"},
            {"item_id": "a", "content": {}, "insert_date_": "2024-05-01T10:00:01Z"},
            {"item_id": "c", "content": {}, "insert_date_": "2024-05-01T10:00:03Z", "metadata": {"x": 1}},
        ]});
        let actions = parse_actions(response).unwrap().unwrap();
        let ids: Vec<_> = actions.iter().map(|a| a.item_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(actions[2].get("metadata.x"), Some(&json!(1)));

        assert!(parse_actions(json!({"error": "nope"})).unwrap().is_none());
    }

    #[test]
    fn test_parse_conversation_list() {
        let response = json!({"results": [
            {"knowledge_set": "c1", "metadata": {"conversation": {"state": "running"}}},
            {"knowledge_set": "c2", "metadata": {"conversation": {"state": "completed"}}},
            {"metadata": {}},
        ]});
        let list = parse_conversation_list(&response);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].state, ConversationState::Running);
        assert_eq!(list[1].conversation_id, "c2");

        assert!(parse_conversation_list(&json!({})).is_empty());
    }

    #[test]
    fn test_trigger_payload_embeds_simulation() {
        let mut simulation = SimulationConfig::new();
        simulation.insert("search", RunIndex::Nth(1), OverrideEntry::finished(json!("hit")));

        let payload = trigger_payload("agent-1", "hello", &simulation).unwrap();
        assert_eq!(payload["agent_id"], "agent-1");
        assert_eq!(payload["message"]["content"], "hello");
        assert_eq!(
            payload["debug_mode_config"]["tool_configs"]["search"]["overrides"]["1"]["output_overrides"]["output"],
            "hit"
        );
    }

    #[test]
    fn test_tool_failure_filter() {
        let filter = tool_failure_filter("tool-refund");
        assert_eq!(filter["event_value"], "tool-refund");
        assert_eq!(filter["event_type"], "tool_runs_failed");
        assert_eq!(filter["min_count"], 1);
        assert_eq!(filter["comparison_type"], "gte");
    }

    #[test]
    fn test_retrigger_payload_regenerates_in_place() {
        let payload = retrigger_payload("agent-1", "conv-9", "msg-3");
        assert_eq!(
            payload,
            json!({
                "action": "regenerate",
                "regenerate_message_id": "msg-3",
                "agent_id": "agent-1",
                "conversation_id": "conv-9",
            })
        );
        assert!(payload.get("debug_mode_config").is_none());
    }
}
