//! Conversation action envelope

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::json;

/// `content.type` tag carried by tool-run events
pub const TOOL_RUN_CONTENT_TYPE: &str = "tool-run";

/// One immutable event in a conversation log.
///
/// Only the fields the harness reasons about are typed; everything else the
/// vendor sends (e.g. `metadata`) is kept in `extra` so evaluators can still
/// reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Opaque event identifier
    #[serde(default)]
    pub item_id: String,

    /// Heterogeneous payload, shaped by `content.type`
    #[serde(default)]
    pub content: Value,

    /// Insertion timestamp as sent by the vendor
    #[serde(rename = "insert_date_", default, skip_serializing_if = "Option::is_none")]
    pub insert_timestamp: Option<String>,

    /// Remaining vendor fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Action {
    /// Create an action with the given id and content
    pub fn new(item_id: impl Into<String>, content: Value) -> Self {
        Self {
            item_id: item_id.into(),
            content,
            insert_timestamp: None,
            extra: Map::new(),
        }
    }

    /// Set the insertion timestamp
    pub fn with_insert_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.insert_timestamp = Some(timestamp.into());
        self
    }

    /// Attach an extra top-level field (e.g. `metadata`)
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// The `content.type` tag, if present
    pub fn content_type(&self) -> Option<&str> {
        json::lookup_str(&self.content, "type")
    }

    /// Whether this action records a tool invocation
    pub fn is_tool_run(&self) -> bool {
        self.content_type() == Some(TOOL_RUN_CONTENT_TYPE)
    }

    /// Whether this action is flagged as the conversation's trigger message
    pub fn is_trigger_message(&self) -> bool {
        json::lookup(&self.content, "is_trigger_message").is_some_and(json::is_truthy)
    }

    /// Look up a dot path inside `content`
    pub fn content_at(&self, path: &str) -> Option<&Value> {
        json::lookup(&self.content, path)
    }

    /// Look up a dot path rooted at the action itself
    /// (`content.*` or any extra field such as `metadata.*`)
    pub fn get(&self, path: &str) -> Option<&Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let root = match head {
            "content" => &self.content,
            _ => self.extra.get(head)?,
        };
        match rest {
            Some(rest) => json::lookup(root, rest),
            None => Some(root),
        }
    }
}
