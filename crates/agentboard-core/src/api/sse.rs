//! Decoder turning raw byte fragments into typed `StreamEvent`s.
//!
//! The backend pushes frames of one `event: <name>` line followed by one or
//! more `data: <json>` lines; each data line yields one event bound to the
//! most recently seen event name. This differs from standard SSE dispatch
//! (no blank-line batching, no data-line joining), so the framing is done
//! here rather than through an SSE crate.
//!
//! A malformed or unrecognized payload is dropped with a warning; one
//! corrupt event never aborts the stream. Transport failures from the
//! underlying byte stream surface as `Err` items.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use serde::de::DeserializeOwned;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{
    CompletePayload, ConfirmPayload, ErrorPayload, SessionPayload, TokenPayload, ToolCallPayload,
    ToolResultPayload,
};
use crate::api::StreamEvent;

/// Streaming decoder over a fragmented byte source.
///
/// Emits only on line boundaries: an unterminated trailing line is retained
/// across chunk reads, and multi-byte UTF-8 sequences split across chunks
/// reassemble intact because the buffer is only ever cut at newline bytes.
pub struct SseParser<S> {
    inner: S,
    buf: Vec<u8>,
    event_name: Option<String>,
    pending: VecDeque<StreamEvent>,
    done: bool,
}

impl<S> SseParser<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            event_name: None,
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Consumes every complete line currently buffered.
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let rest = self.buf.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buf, rest);
            line.pop(); // \n
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.handle_line(&line);
        }
    }

    fn handle_line(&mut self, line: &[u8]) {
        let Ok(line) = std::str::from_utf8(line) else {
            tracing::warn!("Dropping non-UTF-8 stream line ({} bytes)", line.len());
            return;
        };

        if line.is_empty() {
            // Frame separator; the bound event name stays in effect for any
            // further data lines.
            return;
        }

        if let Some(name) = line.strip_prefix("event: ") {
            self.event_name = Some(name.trim().to_string());
        } else if let Some(data) = line.strip_prefix("data: ") {
            match self.event_name.as_deref() {
                Some(name) => {
                    if let Some(event) = decode_event_fields(name, data) {
                        self.pending.push_back(event);
                    }
                }
                None => tracing::warn!("Dropping data line with no preceding event name"),
            }
        } else {
            tracing::debug!("Ignoring unrecognized stream line: {line}");
        }
    }
}

impl<S, E> Stream for SseParser<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ApiResult<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.buf.extend_from_slice(&chunk);
                    self.drain_lines();
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(ApiError::transport(format!(
                        "stream read failed: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    // End of input. A trailing partial line never produced a
                    // boundary, so it is discarded; no terminal event is
                    // synthesized for a prematurely closed stream.
                    if !self.buf.is_empty() {
                        tracing::warn!(
                            "Stream closed with {} unterminated bytes buffered",
                            self.buf.len()
                        );
                    }
                    self.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

fn parse_payload<T: DeserializeOwned>(name: &str, data: &str) -> Option<T> {
    match serde_json::from_str(data) {
        Ok(payload) => Some(payload),
        Err(err) => {
            tracing::warn!("Dropping malformed {name} payload: {err}");
            None
        }
    }
}

/// Decodes one (event name, data payload) pair.
///
/// Returns `None` for payloads that should be dropped: malformed JSON or an
/// event name this engine does not recognize.
fn decode_event_fields(name: &str, data: &str) -> Option<StreamEvent> {
    match name {
        "session" => parse_payload::<SessionPayload>(name, data)
            .map(|p| StreamEvent::Session { session_id: p.session_id }),
        "token" => {
            parse_payload::<TokenPayload>(name, data).map(|p| StreamEvent::Token { text: p.text })
        }
        "tool_call" => parse_payload::<ToolCallPayload>(name, data).map(|p| StreamEvent::ToolCall {
            name: p.name,
            input: p.input,
        }),
        "tool_result" => {
            parse_payload::<ToolResultPayload>(name, data).map(|p| StreamEvent::ToolResult {
                name: p.name,
                result: p.result,
                success: p.success,
            })
        }
        "thinking" => Some(StreamEvent::Thinking),
        "confirm" => parse_payload::<ConfirmPayload>(name, data)
            .map(|p| StreamEvent::Confirm { message: p.message }),
        "complete" => parse_payload::<CompletePayload>(name, data).map(|p| StreamEvent::Complete {
            output_preview: p.output_preview,
        }),
        "error" => {
            parse_payload::<ErrorPayload>(name, data).map(|p| StreamEvent::Error { error: p.error })
        }
        other => {
            tracing::warn!("Dropping unknown stream event: {other}");
            None
        }
    }
}
