//! Plan-then-execute task controller.
//!
//! A task chat opens in Planning: the agent may ask clarifying questions
//! before the user authorizes real work. A whole-message affirmative reply
//! flips the chat into Executing, which runs the distinct execution call
//! exactly once and lands in Done whether it succeeds or fails.

use tokio_util::sync::CancellationToken;

use crate::api::{BoardClient, HistoryPair};
use crate::core::events::{Message, SessionUpdate, UpdateSender};
use crate::core::turn::{TurnOutcome, drive_turn};

/// Task chat phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPhase {
    Planning,
    Executing,
    Done,
}

/// Affirmative/imperative replies that authorize execution.
///
/// Matching is whole-message and case-insensitive after trimming; a reply
/// that merely contains one of these words keeps the planning conversation
/// going. Stored lowercase.
const EXECUTION_TRIGGERS: &[&str] = &[
    // English
    "go", "yes", "y", "ok", "okay", "do it", "proceed", "start", "run", "run it", "execute",
    "ship it", "lgtm", "sounds good", "go ahead",
    // Spanish / Portuguese
    "vamos", "dale", "hazlo", "sí", "si", "vai", "bora", "pode ir",
    // French
    "oui", "vas-y", "allez", "d'accord",
    // Italian
    "avanti", "procedi",
    // German
    "ja", "los", "mach es", "leg los",
    // Russian
    "давай", "да", "поехали",
    // Japanese
    "はい", "やって", "実行", "開始",
    // Chinese
    "好", "好的", "开始", "执行",
    // Korean
    "네", "시작", "좋아",
];

/// Tests a planning reply against the execution trigger vocabulary.
pub fn is_execution_trigger(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    EXECUTION_TRIGGERS.contains(&normalized.as_str())
}

/// Card-scoped conversation steering one task from plan to execution.
#[derive(Debug, Clone)]
pub struct TaskChat {
    pub task_id: String,
    pub title: String,
    pub instructions: String,
    pub skill_id: String,
    pub phase: TaskPhase,
    model: String,
    pub messages: Vec<Message>,
    pub history: Vec<HistoryPair>,
    pub output_preview: Option<String>,
    pub failed: bool,
}

impl TaskChat {
    /// Creates a task chat in Planning with the given model selected.
    pub fn new(
        task_id: impl Into<String>,
        title: impl Into<String>,
        instructions: impl Into<String>,
        skill_id: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            title: title.into(),
            instructions: instructions.into(),
            skill_id: skill_id.into(),
            phase: TaskPhase::Planning,
            model: model.into(),
            messages: Vec::new(),
            history: Vec::new(),
            output_preview: None,
            failed: false,
        }
    }

    /// The currently selected model id.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Switches the planning model. Refused once execution has begun.
    pub fn set_model(&mut self, model: impl Into<String>) -> bool {
        if self.phase != TaskPhase::Planning {
            tracing::warn!("Model is frozen once execution begins");
            return false;
        }
        self.model = model.into();
        true
    }

    /// Whether this chat may be torn down right now.
    ///
    /// Closing while the execution call is live would silently abandon it.
    pub fn can_close(&self) -> bool {
        self.phase != TaskPhase::Executing
    }

    /// Opens the planning conversation with a turn synthesized from the
    /// task's title and instructions.
    pub async fn begin_planning(
        &mut self,
        client: &BoardClient,
        cancel: CancellationToken,
        updates: &UpdateSender,
    ) -> TurnOutcome {
        let opening = self.opening_message();
        self.planning_turn(client, opening, cancel, updates).await
    }

    fn opening_message(&self) -> String {
        if self.instructions.is_empty() {
            format!("Task: {}", self.title)
        } else {
            format!("Task: {}\n\n{}", self.title, self.instructions)
        }
    }

    /// Handles a user reply.
    ///
    /// In Planning, an execution trigger flips the phase and runs the task;
    /// anything else continues the planning conversation. Replies during
    /// Executing or after Done are refused.
    pub async fn send(
        &mut self,
        client: &BoardClient,
        text: impl Into<String>,
        cancel: CancellationToken,
        updates: &UpdateSender,
    ) -> TurnOutcome {
        let text = text.into();
        match self.phase {
            TaskPhase::Planning if is_execution_trigger(&text) => {
                self.messages.push(Message::user(text.clone()));
                updates
                    .send_important(SessionUpdate::UserMessage { text: text.clone() })
                    .await;
                self.execute(client, &text, cancel, updates).await
            }
            TaskPhase::Planning => self.planning_turn(client, text, cancel, updates).await,
            TaskPhase::Executing => {
                tracing::warn!("Task {} is executing; reply ignored", self.task_id);
                TurnOutcome::Rejected
            }
            TaskPhase::Done => {
                tracing::warn!("Task {} is done; reply ignored", self.task_id);
                TurnOutcome::Rejected
            }
        }
    }

    async fn planning_turn(
        &mut self,
        client: &BoardClient,
        text: String,
        cancel: CancellationToken,
        updates: &UpdateSender,
    ) -> TurnOutcome {
        self.messages.push(Message::user(text.clone()));
        updates
            .send_important(SessionUpdate::UserMessage { text: text.clone() })
            .await;

        let stream = match client
            .run_planning(&self.skill_id, &text, &self.history, &self.model)
            .await
        {
            Ok(stream) => stream,
            Err(err) => {
                updates
                    .send_important(SessionUpdate::TurnFailed {
                        error: err.to_string(),
                        has_partial: false,
                    })
                    .await;
                return TurnOutcome::Errored;
            }
        };

        drive_turn(
            &mut self.messages,
            &mut self.history,
            &text,
            stream,
            &cancel,
            updates,
        )
        .await
        .outcome
    }

    /// Runs the real task exactly once. Terminal either way: Complete records
    /// the output preview, anything else marks the task failed. No retry.
    async fn execute(
        &mut self,
        client: &BoardClient,
        trigger_text: &str,
        cancel: CancellationToken,
        updates: &UpdateSender,
    ) -> TurnOutcome {
        self.phase = TaskPhase::Executing;

        let stream = match client.run_execution(&self.task_id).await {
            Ok(stream) => stream,
            Err(err) => {
                self.failed = true;
                self.phase = TaskPhase::Done;
                updates
                    .send_important(SessionUpdate::TurnFailed {
                        error: err.to_string(),
                        has_partial: false,
                    })
                    .await;
                return TurnOutcome::Errored;
            }
        };

        let result = drive_turn(
            &mut self.messages,
            &mut self.history,
            trigger_text,
            stream,
            &cancel,
            updates,
        )
        .await;

        match result.outcome {
            TurnOutcome::Completed => {
                self.output_preview = result.output_preview;
            }
            TurnOutcome::Cancelled => {}
            TurnOutcome::Errored | TurnOutcome::Disconnected | TurnOutcome::Rejected => {
                self.failed = true;
            }
        }
        self.phase = TaskPhase::Done;

        result.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_matches_whole_message_only() {
        assert!(is_execution_trigger("go"));
        assert!(is_execution_trigger("GO"));
        assert!(is_execution_trigger("  Ok  "));
        assert!(is_execution_trigger("do it"));
        assert!(!is_execution_trigger("tell me more about X"));
        assert!(!is_execution_trigger("is it ok to start?"));
        assert!(!is_execution_trigger(""));
    }

    #[test]
    fn test_trigger_matches_localized_equivalents() {
        assert!(is_execution_trigger("vamos"));
        assert!(is_execution_trigger("Oui"));
        assert!(is_execution_trigger("давай"));
        assert!(is_execution_trigger("開始"));
        assert!(!is_execution_trigger("vamos a pensar más"));
    }

    #[test]
    fn test_model_frozen_outside_planning() {
        let mut task = TaskChat::new("t1", "Fix bug", "Fix the login bug", "coder", "model-a");
        assert!(task.set_model("model-b"));
        assert_eq!(task.model(), "model-b");

        task.phase = TaskPhase::Executing;
        assert!(!task.set_model("model-c"));
        assert_eq!(task.model(), "model-b");

        task.phase = TaskPhase::Done;
        assert!(!task.set_model("model-c"));
    }

    #[test]
    fn test_close_guard_only_while_executing() {
        let mut task = TaskChat::new("t1", "Fix bug", "", "coder", "model-a");
        assert!(task.can_close());
        task.phase = TaskPhase::Executing;
        assert!(!task.can_close());
        task.phase = TaskPhase::Done;
        assert!(task.can_close());
    }

    #[test]
    fn test_opening_message_carries_title_and_instructions() {
        let task = TaskChat::new("t1", "Write release notes", "Cover v1.2", "writer", "m");
        let opening = task.opening_message();
        assert!(opening.contains("Write release notes"));
        assert!(opening.contains("Cover v1.2"));

        let bare = TaskChat::new("t2", "Write release notes", "", "writer", "m");
        assert_eq!(bare.opening_message(), "Task: Write release notes");
    }
}
