//! Session lifecycle integration tests against a mock backend.


use std::sync::Arc;
use std::time::Duration;

use agentboard_core::api::{BoardClient, ClientConfig, EventStream};
use agentboard_core::core::events::{SessionUpdate, UpdateSender, create_update_channel};
use agentboard_core::core::session::{ChatSession, SessionStatus, request_kill};
use agentboard_core::core::turn::TurnOutcome;
use fixtures::{error_frame, sse_response, text_turn};
use futures_util::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_turn_streams_to_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/s-1/messages"))
        .and(body_json(json!({ "text": "say hello" })))
        .respond_with(sse_response(&text_turn(&["Hel", "lo"])))
        .expect(1)
        .mount(&server)
        .await;

    let client = BoardClient::new(ClientConfig::new(server.uri()));
    let mut session = ChatSession::new("s-1", "Greeter", "chat");
    let (tx, mut rx) = create_update_channel();
    let updates = UpdateSender::new(tx);

    let outcome = session
        .run_turn(&client, "say hello", CancellationToken::new(), &updates)
        .await;

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(session.status, SessionStatus::Idle);
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[1].content, "Hello");
    assert_eq!(session.history.len(), 1);
    assert_eq!(session.history[0].assistant, "Hello");

    // The user message lands first, completion last.
    drop(updates);
    let mut received = Vec::new();
    while let Some(update) = rx.recv().await {
        received.push(Arc::unwrap_or_clone(update));
    }
    assert!(matches!(
        received.first(),
        Some(SessionUpdate::UserMessage { text }) if text == "say hello"
    ));
    assert!(matches!(
        received.last(),
        Some(SessionUpdate::TurnCompleted { content }) if content == "Hello"
    ));
}

#[tokio::test]
async fn test_send_while_streaming_is_refused() {
    let client = BoardClient::new(ClientConfig::new("http://localhost:1"));
    let mut session = ChatSession::new("s-1", "Busy", "chat");
    session.status = SessionStatus::Streaming;
    let (tx, rx) = create_update_channel();
    drop(rx);

    let outcome = session
        .run_turn(
            &client,
            "second message",
            CancellationToken::new(),
            &UpdateSender::new(tx),
        )
        .await;

    // No concurrent turns per session: nothing was sent, nothing mutated.
    assert_eq!(outcome, TurnOutcome::Rejected);
    assert!(session.messages.is_empty());
}

#[tokio::test]
async fn test_transport_failure_marks_session_errored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/s-1/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = BoardClient::new(ClientConfig::new(server.uri()));
    let mut session = ChatSession::new("s-1", "Greeter", "chat");
    let (tx, rx) = create_update_channel();
    drop(rx);

    let outcome = session
        .run_turn(
            &client,
            "hello",
            CancellationToken::new(),
            &UpdateSender::new(tx),
        )
        .await;

    assert_eq!(outcome, TurnOutcome::Errored);
    assert_eq!(session.status, SessionStatus::Errored);
    // The user message stays; no empty assistant turn was created.
    assert_eq!(session.messages.len(), 1);
}

#[tokio::test]
async fn test_agent_error_event_surfaces_and_ends_turn() {
    let server = MockServer::start().await;
    let body = format!("{}{}", text_turn(&["part"]), error_frame("ignored"));
    // An error after complete is ignored; a turn ending in error is the
    // interesting case, so mount that on a second session.
    Mock::given(method("POST"))
        .and(path("/sessions/ok/messages"))
        .respond_with(sse_response(&body))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sessions/bad/messages"))
        .respond_with(sse_response(&error_frame("model unavailable")))
        .mount(&server)
        .await;

    let client = BoardClient::new(ClientConfig::new(server.uri()));
    let (tx, rx) = create_update_channel();
    drop(rx);
    let updates = UpdateSender::new(tx);

    let mut ok_session = ChatSession::new("ok", "A", "chat");
    let outcome = ok_session
        .run_turn(&client, "hi", CancellationToken::new(), &updates)
        .await;
    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(ok_session.messages[1].content, "part");

    let mut bad_session = ChatSession::new("bad", "B", "chat");
    let outcome = bad_session
        .run_turn(&client, "hi", CancellationToken::new(), &updates)
        .await;
    assert_eq!(outcome, TurnOutcome::Errored);
    assert_eq!(bad_session.status, SessionStatus::Errored);
    assert_eq!(bad_session.messages.len(), 1);
}

#[tokio::test]
async fn test_kill_leaves_cancelled_even_when_notification_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/s-1/kill"))
        .respond_with(ResponseTemplate::new(500).set_body_string("kill unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let client = BoardClient::new(ClientConfig::new(server.uri()));
    let cancel = CancellationToken::new();
    let (tx, rx) = create_update_channel();
    drop(rx);

    let mut session = ChatSession::new("s-1", "Long runner", "research");
    // A stream that never yields: the loop sits at its read suspension point.
    let stream: EventStream = futures_util::stream::pending().boxed();

    let drive = tokio::spawn({
        let cancel = cancel.clone();
        let updates = UpdateSender::new(tx);
        async move {
            let outcome = session.drive_stream(stream, "work", cancel, &updates).await;
            (session, outcome)
        }
    });

    // Let the loop reach its first await, then stop it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    request_kill(&client, "s-1", &cancel);

    let (session, outcome) = drive.await.unwrap();
    assert_eq!(outcome, TurnOutcome::Cancelled);
    assert_eq!(session.status, SessionStatus::Cancelled);

    // Give the fire-and-forget notification time to reach the mock; the
    // failing ack must not affect the local state asserted above.
    tokio::time::sleep(Duration::from_millis(200)).await;
}
