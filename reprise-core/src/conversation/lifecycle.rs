//! Conversation lifecycle states

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::json;

/// Execution status of a conversation as reported by the platform.
///
/// The active/terminal partition drives replay polling: only the four
/// active states keep the poller waiting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConversationState {
    Paused,
    Idle,
    StartingUp,
    Running,
    PendingApproval,
    WaitingForCapacity,
    Cancelled,
    TimedOut,
    Escalated,
    Unrecoverable,
    Completed,
    ErroredPendingApproval,
    QueuedForApproval,
    QueuedForRerun,
    /// Any tag this crate does not know, kept verbatim
    Unknown(String),
}

impl ConversationState {
    /// Parse a vendor state tag. Never fails; unrecognized tags become `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "paused" => Self::Paused,
            "idle" => Self::Idle,
            "starting-up" => Self::StartingUp,
            "running" => Self::Running,
            "pending-approval" => Self::PendingApproval,
            "waiting-for-capacity" => Self::WaitingForCapacity,
            "cancelled" => Self::Cancelled,
            "timed-out" => Self::TimedOut,
            "escalated" => Self::Escalated,
            "unrecoverable" => Self::Unrecoverable,
            "completed" => Self::Completed,
            "errored-pending-approval" => Self::ErroredPendingApproval,
            "queued-for-approval" => Self::QueuedForApproval,
            "queued-for-rerun" => Self::QueuedForRerun,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Vendor tag for this state
    pub fn as_str(&self) -> &str {
        match self {
            Self::Paused => "paused",
            Self::Idle => "idle",
            Self::StartingUp => "starting-up",
            Self::Running => "running",
            Self::PendingApproval => "pending-approval",
            Self::WaitingForCapacity => "waiting-for-capacity",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed-out",
            Self::Escalated => "escalated",
            Self::Unrecoverable => "unrecoverable",
            Self::Completed => "completed",
            Self::ErroredPendingApproval => "errored-pending-approval",
            Self::QueuedForApproval => "queued-for-approval",
            Self::QueuedForRerun => "queued-for-rerun",
            Self::Unknown(raw) => raw,
        }
    }

    /// Still progressing: starting-up, running, waiting-for-capacity, queued-for-rerun
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::StartingUp | Self::Running | Self::WaitingForCapacity | Self::QueuedForRerun
        )
    }

    /// Everything that is not active
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// States that mark a conversation as failed
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ErroredPendingApproval | Self::Unrecoverable | Self::TimedOut
        )
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ConversationState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConversationState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// One entry of a conversation listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation identifier
    pub conversation_id: String,
    /// Current lifecycle state
    pub state: ConversationState,
}

impl ConversationSummary {
    /// Create a summary
    pub fn new(conversation_id: impl Into<String>, state: ConversationState) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            state,
        }
    }

    /// Project a vendor listing entry.
    ///
    /// The id lives in `knowledge_set` and the state in
    /// `metadata.conversation.state`. A missing state is kept as an empty
    /// `Unknown`, which counts as terminal.
    pub fn from_listing_entry(entry: &Value) -> Option<Self> {
        let conversation_id = json::lookup_str(entry, "knowledge_set")?;
        let state = json::lookup(entry, "metadata.conversation.state")
            .and_then(Value::as_str)
            .map(ConversationState::parse)
            .unwrap_or_else(|| ConversationState::Unknown(String::new()));
        Some(Self::new(conversation_id, state))
    }
}
