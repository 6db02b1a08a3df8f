//! Conversation event logs and the facts extracted from them
//!
//! A conversation is an append-only, time-ordered log of [`Action`]s whose
//! `content` payload varies by `content.type`. This module provides:
//!
//! - The [`Action`] envelope and lifecycle [`ConversationState`] tags
//! - Extraction of the trigger message and tool-run facts
//! - The message to regenerate from when re-running a failed tool
//!
//! # Example
//!
//! ```rust,ignore
//! use reprise_core::conversation::{extract_tool_runs, extract_tool_data_from_run};
//!
//! let facts: Vec<_> = extract_tool_runs(&actions)
//!     .into_iter()
//!     .filter_map(extract_tool_data_from_run)
//!     .collect();
//! ```

mod action;
mod extract;
mod lifecycle;

pub use action::{Action, TOOL_RUN_CONTENT_TYPE};
pub use extract::{
    extract_tool_data_from_run, extract_tool_runs, extract_trigger_message, regenerate_message_id,
    ToolRunFact, ToolRunState, TriggerMessage, UNKNOWN_ERROR_OUTPUT,
};
pub use lifecycle::{ConversationState, ConversationSummary};
