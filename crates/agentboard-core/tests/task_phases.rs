//! Task phase walk: planning conversation, trigger-gated execution, terminal
//! outcomes.


use agentboard_core::api::{BoardClient, ClientConfig};
use agentboard_core::core::events::{UpdateSender, create_update_channel};
use agentboard_core::core::task::{TaskChat, TaskPhase};
use agentboard_core::core::turn::TurnOutcome;
use fixtures::{
    complete_frame, error_frame, sse_response, text_turn, token_frames, tool_call_frame,
    tool_result_frame,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer};

fn updates() -> UpdateSender {
    let (tx, rx) = create_update_channel();
    drop(rx);
    UpdateSender::new(tx)
}

fn task() -> TaskChat {
    TaskChat::new(
        "t-9",
        "Archive stale cards",
        "Archive every card untouched for 30 days.",
        "board-keeper",
        "model-x",
    )
}

#[tokio::test]
async fn test_planning_conversation_then_trigger_executes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks/planning"))
        .and(body_partial_json(json!({ "model": "model-x" })))
        .respond_with(sse_response(&text_turn(&["Which columns count as stale?"])))
        .expect(2)
        .mount(&server)
        .await;

    let execution_body = format!(
        "{}{}{}{}",
        token_frames(&["Archiving"]),
        tool_call_frame("archive_card", json!({ "card": "c-12" })),
        tool_result_frame("archive_card", json!({ "ok": true }), true),
        complete_frame(Some("Archived 1 card"))
    );
    Mock::given(method("POST"))
        .and(path("/tasks/t-9/execute"))
        .respond_with(sse_response(&execution_body))
        .expect(1)
        .mount(&server)
        .await;

    let client = BoardClient::new(ClientConfig::new(server.uri()));
    let sender = updates();
    let mut task = task();

    // Planning opens with a synthesized turn from the card.
    let outcome = task
        .begin_planning(&client, CancellationToken::new(), &sender)
        .await;
    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(task.phase, TaskPhase::Planning);
    assert_eq!(task.messages.len(), 2);
    assert!(task.messages[0].content.contains("Archive stale cards"));
    assert_eq!(task.history.len(), 1);

    // A substantive reply keeps planning going.
    let outcome = task
        .send(
            &client,
            "tell me more about the cutoff",
            CancellationToken::new(),
            &sender,
        )
        .await;
    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(task.phase, TaskPhase::Planning);
    assert_eq!(task.history.len(), 2);

    // The whole-message affirmative flips into execution.
    let outcome = task
        .send(&client, "go", CancellationToken::new(), &sender)
        .await;
    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(task.phase, TaskPhase::Done);
    assert!(!task.failed);
    assert_eq!(task.output_preview.as_deref(), Some("Archived 1 card"));

    // The execution turn recorded the tool activity.
    let last = task.messages.last().unwrap();
    assert_eq!(last.content, "Archiving");
    assert_eq!(last.tool_calls.len(), 1);

    // Done is terminal.
    assert!(task.can_close());
    assert!(!task.set_model("model-y"));
    let outcome = task
        .send(&client, "one more thing", CancellationToken::new(), &sender)
        .await;
    assert_eq!(outcome, TurnOutcome::Rejected);
}

#[tokio::test]
async fn test_execution_error_still_reaches_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks/planning"))
        .respond_with(sse_response(&text_turn(&["Ready when you are."])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tasks/t-9/execute"))
        .respond_with(sse_response(&error_frame("board API rejected the write")))
        .expect(1)
        .mount(&server)
        .await;

    let client = BoardClient::new(ClientConfig::new(server.uri()));
    let sender = updates();
    let mut task = task();

    task.begin_planning(&client, CancellationToken::new(), &sender)
        .await;
    let outcome = task
        .send(&client, "ok", CancellationToken::new(), &sender)
        .await;

    // Terminal either way: failed, but Done, and no retry was attempted.
    assert_eq!(outcome, TurnOutcome::Errored);
    assert_eq!(task.phase, TaskPhase::Done);
    assert!(task.failed);
    assert!(task.can_close());
}

#[tokio::test]
async fn test_planning_requests_carry_history() {
    let server = MockServer::start().await;
    // First turn: the synthesized opening message.
    Mock::given(method("POST"))
        .and(path("/tasks/planning"))
        .and(body_partial_json(json!({
            "message": "Task: Archive stale cards\n\nArchive every card untouched for 30 days."
        })))
        .respond_with(sse_response(&text_turn(&["What is in scope?"])))
        .expect(1)
        .mount(&server)
        .await;
    // Second turn: the completed first exchange is threaded back in.
    Mock::given(method("POST"))
        .and(path("/tasks/planning"))
        .and(body_partial_json(json!({
            "message": "only the backlog column",
            "history": [{
                "user": "Task: Archive stale cards\n\nArchive every card untouched for 30 days.",
                "assistant": "What is in scope?"
            }]
        })))
        .respond_with(sse_response(&text_turn(&["Understood."])))
        .expect(1)
        .mount(&server)
        .await;

    let client = BoardClient::new(ClientConfig::new(server.uri()));
    let sender = updates();
    let mut task = task();

    task.begin_planning(&client, CancellationToken::new(), &sender)
        .await;
    let outcome = task
        .send(
            &client,
            "only the backlog column",
            CancellationToken::new(),
            &sender,
        )
        .await;
    assert_eq!(outcome, TurnOutcome::Completed);
}
