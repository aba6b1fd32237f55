//! Conversation types and observer update channels.
//!
//! `Message` and `ToolCall` are the durable conversation state; observers
//! (a panel, a TUI, a test) additionally receive `SessionUpdate`s over an
//! async channel while a turn streams.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle of one tool invocation inside a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Running,
    Completed,
    Failed,
    PendingConfirmation,
    Confirmed,
    Rejected,
}

impl ToolCallStatus {
    /// Whether a `tool_result` may still resolve this call.
    ///
    /// A pending confirmation remains resolvable: a result arriving means
    /// the tool ran after an out-of-band approval.
    pub fn is_resolvable(self) -> bool {
        matches!(
            self,
            ToolCallStatus::Running | ToolCallStatus::PendingConfirmation
        )
    }
}

/// One tool invocation observed inside a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub input: Value,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ToolCall {
    /// Creates a freshly started call.
    pub fn running(name: impl Into<String>, input: Value) -> Self {
        Self {
            name: name.into(),
            input,
            status: ToolCallStatus::Running,
            result: None,
        }
    }
}

/// One message in a session or task conversation.
///
/// Assistant content grows while the turn streams and is frozen once a
/// terminal event arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Error annotation for a turn that failed after producing content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Outstanding human confirmation gate, if the agent asked for one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_message: Option<String>,
}

impl Message {
    /// Creates a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            tool_calls: Vec::new(),
            error: None,
            confirm_message: None,
        }
    }

    /// Creates the empty assistant message a streaming turn accumulates into.
    pub fn assistant_placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: Vec::new(),
            error: None,
            confirm_message: None,
        }
    }

    /// Creates a completed assistant message (used on restore).
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            content: text.into(),
            ..Self::assistant_placeholder()
        }
    }

    /// Whether the turn has produced anything worth keeping.
    pub fn has_progress(&self) -> bool {
        !self.content.is_empty() || !self.tool_calls.is_empty()
    }

    /// Records the human decision for the most recent confirmation gate.
    ///
    /// Returns false when no call is awaiting confirmation. This is the only
    /// path that resolves a gate; the stream itself never does.
    pub fn resolve_confirmation(&mut self, accept: bool) -> bool {
        let Some(call) = self
            .tool_calls
            .iter_mut()
            .rev()
            .find(|c| c.status == ToolCallStatus::PendingConfirmation)
        else {
            return false;
        };
        call.status = if accept {
            ToolCallStatus::Confirmed
        } else {
            ToolCallStatus::Rejected
        };
        self.confirm_message = None;
        true
    }
}

/// Updates republished to observers while a turn streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionUpdate {
    /// The user's message was appended to the log.
    UserMessage { text: String },

    /// Incremental assistant text chunk.
    AssistantDelta { text: String },

    /// A tool invocation started.
    ToolCallStarted { name: String },

    /// A tool invocation resolved.
    ToolCallResolved { name: String, success: bool },

    /// The agent asked for human confirmation.
    ConfirmationRequested { message: String },

    /// The turn finished normally with the final content.
    TurnCompleted { content: String },

    /// The turn failed. `has_partial` distinguishes "annotate the bubble"
    /// from "show a standalone error marker".
    TurnFailed { error: String, has_partial: bool },

    /// The user stopped the turn; rendered distinctly from failure.
    TurnCancelled,
}

/// Channel-based update sender (async, bounded).
pub type UpdateTx = mpsc::Sender<Arc<SessionUpdate>>;

/// Channel-based update receiver (async, bounded).
pub type UpdateRx = mpsc::Receiver<Arc<SessionUpdate>>;

/// Default channel capacity for update streams.
pub const DEFAULT_UPDATE_CHANNEL_CAPACITY: usize = 128;

/// Creates a bounded update channel with the default capacity.
pub fn create_update_channel() -> (UpdateTx, UpdateRx) {
    mpsc::channel(DEFAULT_UPDATE_CHANNEL_CAPACITY)
}

/// Update sender with best-effort and reliable send modes.
///
/// Use `send_delta()` for high-volume token updates that can be dropped if
/// the consumer is slow; `send_important()` for everything that must arrive.
#[derive(Clone)]
pub struct UpdateSender {
    tx: UpdateTx,
}

impl UpdateSender {
    /// Wraps a channel sender.
    pub fn new(tx: UpdateTx) -> Self {
        Self { tx }
    }

    /// Best-effort send: never awaits, drops if the channel is full.
    pub fn send_delta(&self, update: SessionUpdate) {
        let _ = self.tx.try_send(Arc::new(update));
    }

    /// Reliable send: awaits delivery.
    pub async fn send_important(&self, update: SessionUpdate) {
        let _ = self.tx.send(Arc::new(update)).await;
    }
}
