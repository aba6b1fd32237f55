//! Wire types for the agents backend.
//!
//! Payload structs for decoded stream events, request bodies for the
//! outbound operations, and the persisted session summary consumed on
//! restore.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// === Stream event payloads ===

#[derive(Debug, Deserialize)]
pub(crate) struct SessionPayload {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenPayload {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolCallPayload {
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolResultPayload {
    pub name: String,
    #[serde(default)]
    pub result: Value,
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmPayload {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletePayload {
    #[serde(default)]
    pub output_preview: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    pub error: String,
}

// === Request bodies ===

#[derive(Debug, Serialize)]
pub(crate) struct CreateSessionRequest<'a> {
    pub skill_id: &'a str,
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PostMessageRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RenameSessionRequest<'a> {
    pub title: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RunPlanningRequest<'a> {
    pub skill_id: &'a str,
    pub message: &'a str,
    pub history: &'a [HistoryPair],
    pub model: &'a str,
}

// === Conversation history ===

/// One completed user/assistant exchange, carried into subsequent planning turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPair {
    pub user: String,
    pub assistant: String,
}

// === Persisted session summaries ===

/// Persisted session summary returned by `list-sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub skill_id: String,
    pub status: String,
    #[serde(default)]
    pub message_history: Vec<StoredTurn>,
}

/// One persisted turn inside a session summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTurn {
    pub role: String,
    pub content: String,
}

impl StoredTurn {
    /// Tool-result turns are internal bookkeeping, not conversation; they are
    /// skipped when rebuilding the local message log.
    pub fn is_conversational(&self) -> bool {
        matches!(self.role.as_str(), "user" | "assistant")
    }
}
