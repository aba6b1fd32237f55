//! Per-turn event folding.
//!
//! `TurnAccumulator` applies exactly one state mutation per decoded event,
//! in arrival order, so an observer always sees a monotonically improving
//! view of the turn. `drive_turn` wraps the accumulator in the cancellable
//! read loop shared by sessions and tasks.

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::api::{EventStream, HistoryPair, StreamEvent};
use crate::core::events::{Message, Role, SessionUpdate, ToolCall, ToolCallStatus, UpdateSender};

/// How a driven turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Terminal `complete` event observed.
    Completed,
    /// The connection closed without any terminal event.
    Disconnected,
    /// The user stopped the turn.
    Cancelled,
    /// The turn failed (agent error or transport failure).
    Errored,
    /// The request was refused without starting a turn.
    Rejected,
}

/// Outcome of `drive_turn`, with the completion payload when present.
#[derive(Debug)]
pub(crate) struct TurnResult {
    pub outcome: TurnOutcome,
    pub output_preview: Option<String>,
}

impl TurnResult {
    fn outcome(outcome: TurnOutcome) -> Self {
        Self {
            outcome,
            output_preview: None,
        }
    }
}

/// Progress reported by the accumulator after each event.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnProgress {
    /// More events expected.
    Streaming,
    /// Terminal `complete` observed; the message is frozen.
    Completed { output_preview: Option<String> },
    /// Terminal `error` observed; the message carries the annotation if it
    /// had any progress.
    Failed { error: String },
}

/// Folds one turn's events into the in-progress assistant message.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    finished: bool,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal event has been applied.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Applies one decoded event to the turn's message.
    pub async fn apply(
        &mut self,
        message: &mut Message,
        event: StreamEvent,
        updates: &UpdateSender,
    ) -> TurnProgress {
        if self.finished {
            tracing::warn!("Ignoring event after the turn already terminated");
            return TurnProgress::Streaming;
        }

        match event {
            StreamEvent::Session { session_id } => {
                // The session announcement carries no turn state.
                tracing::debug!("Mid-turn session announcement for {session_id}");
            }
            StreamEvent::Token { text } => {
                message.content.push_str(&text);
                updates.send_delta(SessionUpdate::AssistantDelta { text });
            }
            StreamEvent::ToolCall { name, input } => {
                message.tool_calls.push(ToolCall::running(name.clone(), input));
                updates
                    .send_important(SessionUpdate::ToolCallStarted { name })
                    .await;
            }
            StreamEvent::ToolResult {
                name,
                result,
                success,
            } => {
                if resolve_tool(message, &name, result, success) {
                    updates
                        .send_important(SessionUpdate::ToolCallResolved { name, success })
                        .await;
                } else {
                    // A result naming no live call of that name mutates nothing.
                    tracing::debug!("Ignoring result for tool '{name}' with no live call");
                }
            }
            StreamEvent::Thinking => {}
            StreamEvent::Confirm { message: gate } => {
                message.confirm_message = Some(gate.clone());
                if let Some(call) = message
                    .tool_calls
                    .iter_mut()
                    .rev()
                    .find(|c| c.status == ToolCallStatus::Running)
                {
                    call.status = ToolCallStatus::PendingConfirmation;
                }
                updates
                    .send_important(SessionUpdate::ConfirmationRequested { message: gate })
                    .await;
            }
            StreamEvent::Complete { output_preview } => {
                self.finished = true;
                return TurnProgress::Completed { output_preview };
            }
            StreamEvent::Error { error } => {
                self.finished = true;
                if message.has_progress() {
                    message.error = Some(error.clone());
                }
                return TurnProgress::Failed { error };
            }
        }

        TurnProgress::Streaming
    }
}

/// Resolves the most-recently-started call still live under this name.
///
/// The wire protocol carries no call id, so two concurrent calls to the
/// same tool within one turn cannot be told apart here; latest-started wins.
fn resolve_tool(
    message: &mut Message,
    name: &str,
    result: serde_json::Value,
    success: bool,
) -> bool {
    let Some(call) = message
        .tool_calls
        .iter_mut()
        .rev()
        .find(|c| c.name == name && c.status.is_resolvable())
    else {
        return false;
    };
    let was_gated = call.status == ToolCallStatus::PendingConfirmation;
    call.status = if success {
        ToolCallStatus::Completed
    } else {
        ToolCallStatus::Failed
    };
    call.result = Some(result);
    if was_gated {
        // The tool ran; the gate is moot.
        message.confirm_message = None;
    }
    true
}

/// Drives one streamed turn to its end: appends the assistant placeholder,
/// folds events as they arrive, and finalizes the message log and history.
///
/// Cancellation is cooperative; the token is checked before each event, so
/// at most the event already pulled from the stream lands after a cancel.
pub(crate) async fn drive_turn(
    messages: &mut Vec<Message>,
    history: &mut Vec<HistoryPair>,
    user_text: &str,
    mut stream: EventStream,
    cancel: &CancellationToken,
    updates: &UpdateSender,
) -> TurnResult {
    messages.push(Message::assistant_placeholder());
    let mut acc = TurnAccumulator::new();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                discard_empty_placeholder(messages);
                updates.send_important(SessionUpdate::TurnCancelled).await;
                return TurnResult::outcome(TurnOutcome::Cancelled);
            }
            next = stream.next() => match next {
                Some(Ok(event)) => {
                    let message = messages
                        .last_mut()
                        .expect("turn placeholder present while streaming");
                    match acc.apply(message, event, updates).await {
                        TurnProgress::Streaming => {}
                        TurnProgress::Completed { output_preview } => {
                            let content = message.content.clone();
                            history.push(HistoryPair {
                                user: user_text.to_string(),
                                assistant: content.clone(),
                            });
                            updates
                                .send_important(SessionUpdate::TurnCompleted { content })
                                .await;
                            return TurnResult {
                                outcome: TurnOutcome::Completed,
                                output_preview,
                            };
                        }
                        TurnProgress::Failed { error } => {
                            let has_partial = message.has_progress();
                            if !has_partial {
                                messages.pop();
                            }
                            updates
                                .send_important(SessionUpdate::TurnFailed { error, has_partial })
                                .await;
                            return TurnResult::outcome(TurnOutcome::Errored);
                        }
                    }
                }
                Some(Err(err)) => {
                    let message = messages
                        .last_mut()
                        .expect("turn placeholder present while streaming");
                    let has_partial = message.has_progress();
                    if has_partial {
                        message.error = Some(err.to_string());
                    } else {
                        messages.pop();
                    }
                    updates
                        .send_important(SessionUpdate::TurnFailed {
                            error: err.to_string(),
                            has_partial,
                        })
                        .await;
                    return TurnResult::outcome(TurnOutcome::Errored);
                }
                None => {
                    // Silent closure: no terminal event arrived. Partial
                    // content stays as-is; an untouched placeholder goes.
                    discard_empty_placeholder(messages);
                    return TurnResult::outcome(TurnOutcome::Disconnected);
                }
            }
        }
    }
}

fn discard_empty_placeholder(messages: &mut Vec<Message>) {
    if messages
        .last()
        .is_some_and(|m| m.role == Role::Assistant && !m.has_progress())
    {
        messages.pop();
    }
}
