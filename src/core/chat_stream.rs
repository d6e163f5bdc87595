use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use futures_util::stream::{self, Stream, StreamExt};
use memchr::memchr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ChatResponse;
use crate::core::model_client::{ChatTurnRequest, DeltaStream, ModelClient, ModelError};

#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Chunk(String),
    Error(ModelError),
    End,
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Delta(String),
    Done,
    Error(String),
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let payload = extract_data_payload(line)?;
    if payload == "[DONE]" {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(SseEvent::Delta),
        Err(_) => {
            if payload.trim().is_empty() {
                return None;
            }
            Some(SseEvent::Error(format_api_error(payload)))
        }
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        // Some gateways wrap the error object in a one-element array.
        .or_else(|| {
            value
                .pointer("/0/error/message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Render an API error body for display, pretty-printing JSON bodies.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return match extract_error_summary(&json_value).filter(|s| !s.is_empty()) {
                Some(summary) => format!("API Error: {summary}\n```json\n{pretty_json}\n```"),
                None => format!("API Error:\n```json\n{pretty_json}\n```"),
            };
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{trimmed}\n```")
    } else {
        format!("API Error:\n```\n{trimmed}\n```")
    }
}

/// Accumulates raw bytes and hands out complete lines.
#[derive(Default)]
struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<String> {
        loop {
            let newline_pos = memchr(b'\n', &self.buffer)?;
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            match String::from_utf8(line) {
                Ok(text) => return Some(text.trim().to_string()),
                Err(e) => warn!("Invalid UTF-8 in stream: {e}"),
            }
        }
    }

    fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        String::from_utf8(rest)
            .ok()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }
}

struct SseState<S> {
    source: std::pin::Pin<Box<S>>,
    lines: LineBuffer,
    pending: VecDeque<Result<String, ModelError>>,
    done: bool,
}

impl<S> SseState<S> {
    /// Queue the event for `line`; returns true once the stream is over.
    fn accept_line(&mut self, line: &str) -> bool {
        match parse_sse_line(line) {
            Some(SseEvent::Delta(text)) => {
                self.pending.push_back(Ok(text));
                false
            }
            Some(SseEvent::Done) => true,
            Some(SseEvent::Error(message)) => {
                self.pending.push_back(Err(ModelError::Transport(message)));
                true
            }
            None => false,
        }
    }
}

/// Turn a server-sent-event byte stream into a lazy stream of reply
/// fragments. Fragments come out in the order they were received; an
/// API error ends the stream after yielding one `Err`.
pub fn sse_delta_stream<S, B, E>(bytes: S) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = SseState {
        source: Box::pin(bytes),
        lines: LineBuffer::default(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.source.next().await {
                Some(Ok(chunk)) => {
                    state.lines.push(chunk.as_ref());
                    while let Some(line) = state.lines.next_line() {
                        if state.accept_line(&line) {
                            state.done = true;
                            break;
                        }
                    }
                }
                Some(Err(err)) => {
                    state
                        .pending
                        .push_back(Err(ModelError::Transport(format_api_error(&err.to_string()))));
                    state.done = true;
                }
                None => {
                    if let Some(line) = state.lines.take_remainder() {
                        state.accept_line(&line);
                    }
                    state.done = true;
                }
            }
        }
    }))
}

pub struct StreamParams {
    pub client: Arc<dyn ModelClient>,
    pub request: ChatTurnRequest,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

/// Runs chat streams on background tasks and forwards their fragments,
/// tagged with a stream id, to a single receiver.
#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                client,
                request,
                cancel_token,
                stream_id,
            } = params;

            tokio::select! {
                _ = forward_stream(client, request, &tx, stream_id) => {}
                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "chat stream cancelled");
                }
            }
        });
    }

    #[cfg(test)]
    pub fn send_for_test(&self, message: StreamMessage, stream_id: u64) {
        let _ = self.tx.send((message, stream_id));
    }
}

async fn forward_stream(
    client: Arc<dyn ModelClient>,
    request: ChatTurnRequest,
    tx: &mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
) {
    let mut deltas = match client.stream_chat(request).await {
        Ok(deltas) => deltas,
        Err(err) => {
            let _ = tx.send((StreamMessage::Error(err), stream_id));
            let _ = tx.send((StreamMessage::End, stream_id));
            return;
        }
    };

    while let Some(item) = deltas.next().await {
        match item {
            Ok(text) => {
                let _ = tx.send((StreamMessage::Chunk(text), stream_id));
            }
            Err(err) => {
                let _ = tx.send((StreamMessage::Error(err), stream_id));
                break;
            }
        }
    }

    let _ = tx.send((StreamMessage::End, stream_id));
}
