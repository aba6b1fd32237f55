//! Agents backend boundary: wire protocol, decoder, and HTTP client.

pub mod client;
pub mod error;
pub mod sse;
pub mod types;

use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use client::{BoardClient, ClientConfig};
pub use error::{ApiError, ApiErrorKind, ApiResult};
pub use sse::SseParser;
pub use types::{HistoryPair, SessionSummary, StoredTurn};

/// Events decoded from the agent push stream.
///
/// A well-formed stream is terminated by exactly one of `Complete` or
/// `Error`; a silently closed connection ends the stream with neither, and
/// callers must handle that case themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The backend announces the session this stream belongs to.
    Session { session_id: String },

    /// Incremental assistant text.
    Token { text: String },

    /// The agent invoked a tool.
    ToolCall { name: String, input: Value },

    /// A tool invocation finished.
    ToolResult {
        name: String,
        result: Value,
        success: bool,
    },

    /// The agent is reasoning; informational only, no state change.
    Thinking,

    /// Human-in-the-loop gate. Rendered only, never auto-resolved here.
    Confirm { message: String },

    /// The turn finished normally.
    Complete { output_preview: Option<String> },

    /// The agent reported a failure; terminates the turn.
    Error { error: String },
}

/// Boxed stream of decoded events.
///
/// `Err` items carry transport failures; protocol-level damage never
/// surfaces here (the decoder absorbs it).
pub type EventStream = BoxStream<'static, ApiResult<StreamEvent>>;
