//! Per-session lifecycle state machine.
//!
//! A session drives at most one streamed turn at a time. The read loop is
//! cancellable through a `CancellationToken` held by whoever started the
//! turn (typically the tab registry), and always forces the status out of
//! `Streaming` when it ends, however it ends.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::api::{BoardClient, EventStream, HistoryPair, SessionSummary};
use crate::core::events::{Message, SessionUpdate, UpdateSender};
use crate::core::turn::{TurnOutcome, drive_turn};

/// Session execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Streaming,
    Cancelled,
    Errored,
}

impl SessionStatus {
    /// Maps a persisted status string to a local status.
    ///
    /// An in-flight stream cannot be resumed across a restart, only
    /// re-initiated by a new user message, so a stored "running" comes back
    /// as idle.
    pub fn from_stored(stored: &str) -> Self {
        match stored {
            "cancelled" => SessionStatus::Cancelled,
            "errored" | "error" | "failed" => SessionStatus::Errored,
            _ => SessionStatus::Idle,
        }
    }
}

/// One persisted, resumable conversational context.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub skill_id: String,
    pub status: SessionStatus,
    pub messages: Vec<Message>,
    pub history: Vec<HistoryPair>,
    pub last_active: DateTime<Utc>,
}

impl ChatSession {
    /// Creates a fresh session as announced by the backend.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        skill_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            skill_id: skill_id.into(),
            status: SessionStatus::Idle,
            messages: Vec::new(),
            history: Vec::new(),
            last_active: Utc::now(),
        }
    }

    /// Rebuilds a session from a persisted summary.
    ///
    /// Tool-result turns are internal bookkeeping and are skipped.
    pub fn from_summary(summary: SessionSummary) -> Self {
        let messages = summary
            .message_history
            .into_iter()
            .filter(crate::api::StoredTurn::is_conversational)
            .map(|turn| match turn.role.as_str() {
                "user" => Message::user(turn.content),
                _ => Message::assistant(turn.content),
            })
            .collect();

        Self {
            id: summary.id,
            title: summary.title,
            skill_id: summary.skill_id,
            status: SessionStatus::from_stored(&summary.status),
            messages,
            history: Vec::new(),
            last_active: Utc::now(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.status == SessionStatus::Streaming
    }

    fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    /// Sends a user message and streams the resulting turn to its end.
    ///
    /// A session streams at most one turn at a time; a send while one is in
    /// flight is refused without any mutation.
    pub async fn run_turn(
        &mut self,
        client: &BoardClient,
        text: impl Into<String>,
        cancel: CancellationToken,
        updates: &UpdateSender,
    ) -> TurnOutcome {
        if self.is_streaming() {
            tracing::warn!("Session {} is already streaming; send ignored", self.id);
            return TurnOutcome::Rejected;
        }

        let text = text.into();
        self.messages.push(Message::user(text.clone()));
        updates
            .send_important(SessionUpdate::UserMessage { text: text.clone() })
            .await;
        self.touch();

        let stream = match client.post_message(&self.id, &text).await {
            Ok(stream) => stream,
            Err(err) => {
                self.status = SessionStatus::Errored;
                updates
                    .send_important(SessionUpdate::TurnFailed {
                        error: err.to_string(),
                        has_partial: false,
                    })
                    .await;
                return TurnOutcome::Errored;
            }
        };

        self.drive_stream(stream, &text, cancel, updates).await
    }

    /// Drives an already-open event stream as this session's current turn.
    ///
    /// Used both by `run_turn` and by panels adopting the stream handed off
    /// from a launch.
    pub async fn drive_stream(
        &mut self,
        stream: EventStream,
        user_text: &str,
        cancel: CancellationToken,
        updates: &UpdateSender,
    ) -> TurnOutcome {
        if self.is_streaming() {
            tracing::warn!("Session {} already owns a read loop", self.id);
            return TurnOutcome::Rejected;
        }
        self.status = SessionStatus::Streaming;

        let result = drive_turn(
            &mut self.messages,
            &mut self.history,
            user_text,
            stream,
            &cancel,
            updates,
        )
        .await;

        self.status = match result.outcome {
            TurnOutcome::Completed | TurnOutcome::Disconnected => SessionStatus::Idle,
            TurnOutcome::Cancelled => SessionStatus::Cancelled,
            TurnOutcome::Errored => SessionStatus::Errored,
            TurnOutcome::Rejected => SessionStatus::Idle,
        };
        // A silently closed connection must never leave the tab looking live.
        if self.is_streaming() {
            self.status = SessionStatus::Idle;
        }
        self.touch();

        result.outcome
    }
}

/// Cancels a streaming turn and notifies the backend out-of-band.
///
/// The notification is fire-and-forget: the local transition to Cancelled
/// happens in the read loop and does not depend on the ack.
pub fn request_kill(client: &BoardClient, session_id: &str, cancel: &CancellationToken) {
    cancel.cancel();
    let client = client.clone();
    let id = session_id.to_string();
    tokio::spawn(async move {
        if let Err(err) = client.kill_session(&id).await {
            tracing::debug!("Kill notification for session {id} failed: {err}");
        }
    });
}
