//! Streamed completion transport and assembly.
//!
//! [`ChatStreamService`] opens the relay request and drives raw network
//! chunks through a [`StreamAssembler`], publishing `(StreamEvent,
//! stream_id)` pairs on an unbounded channel. The assembler owns the
//! turn's [`StreamState`] and carries line-split state across chunk
//! boundaries, so the assembled content does not depend on how the
//! transport fragmented the bytes.

use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::api::{ChatMessage, ChatRequest, ChatResponse};
use crate::core::config::RelayConfig;
use crate::core::message::{StreamState, StreamStatus};
use crate::error::ChatError;
use crate::utils::url::construct_api_url;

const DONE_SENTINEL: &str = "[DONE]";

/// Incremental outcome of one streaming turn.
///
/// `Update` carries the full accumulated content, not the delta, so
/// observers can render by replacement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Update(String),
    Completed(String),
    Failed { partial: String, error: ChatError },
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Decodes the line-delimited wire protocol and accumulates content
/// deltas for a single in-flight assistant message.
///
/// Terminal states are absorbing: once `Complete` or `Error` is reached,
/// further input produces no events.
pub struct StreamAssembler {
    state: StreamState,
    buffer: Vec<u8>,
}

impl StreamAssembler {
    pub fn new(target_message_id: Uuid) -> Self {
        Self {
            state: StreamState::new(target_message_id),
            buffer: Vec::new(),
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn content(&self) -> &str {
        &self.state.accumulated_content
    }

    /// Feed one network chunk. Chunks may split lines, multi-byte
    /// characters, or the sentinel anywhere; the carry-over buffer keeps
    /// reassembly exact.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.state.status.is_terminal() {
            return events;
        }

        self.buffer.extend_from_slice(chunk);

        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line = match std::str::from_utf8(&self.buffer[..newline_pos]) {
                Ok(s) => s.trim().to_string(),
                Err(e) => {
                    debug!(error = %e, "skipping non-UTF-8 stream line");
                    self.buffer.drain(..=newline_pos);
                    continue;
                }
            };
            self.buffer.drain(..=newline_pos);

            self.process_line(&line, &mut events);
            if self.state.status.is_terminal() {
                break;
            }
        }

        events
    }

    /// Natural end of the byte stream. A final line may arrive without
    /// its trailing newline; it is processed before completion fires.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.state.status.is_terminal() {
            return events;
        }

        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            match std::str::from_utf8(&rest) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    self.process_line(&line, &mut events);
                }
                Err(e) => debug!(error = %e, "dropping non-UTF-8 stream tail"),
            }
        }

        if !self.state.status.is_terminal() {
            self.state.status = StreamStatus::Complete;
            events.push(StreamEvent::Completed(
                self.state.accumulated_content.clone(),
            ));
        }
        events
    }

    /// Terminal failure. Accumulated content is preserved and handed to
    /// the caller, which decides whether to keep the partial turn.
    pub fn fail(&mut self, error: ChatError) -> StreamEvent {
        self.state.status = StreamStatus::Error;
        self.buffer.clear();
        StreamEvent::Failed {
            partial: self.state.accumulated_content.clone(),
            error,
        }
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        // Blank lines, comments, and other non-data fields are ignored.
        let Some(payload) = extract_data_payload(line) else {
            return;
        };

        if payload == DONE_SENTINEL {
            self.state.status = StreamStatus::Complete;
            self.buffer.clear();
            events.push(StreamEvent::Completed(
                self.state.accumulated_content.clone(),
            ));
            return;
        }

        match serde_json::from_str::<ChatResponse>(payload) {
            Ok(response) => {
                if let Some(choice) = response.choices.first() {
                    if let Some(content) = &choice.delta.content {
                        if !content.is_empty() {
                            self.state.status = StreamStatus::Streaming;
                            self.state.accumulated_content.push_str(content);
                            events.push(StreamEvent::Update(
                                self.state.accumulated_content.clone(),
                            ));
                        }
                    }
                }
            }
            Err(e) => {
                // Malformed payload lines are skipped; the stream continues.
                debug!(error = %e, "skipping malformed stream line");
            }
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
                serde_json::Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

/// Reduce a relay error body to a one-line diagnostic detail.
pub fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty response body>".to_string();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&value) {
            if !summary.is_empty() {
                return summary;
            }
        }
    }

    trimmed.to_string()
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub relay: RelayConfig,
    pub history: Vec<ChatMessage>,
    pub target_message_id: Uuid,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamEvent, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamEvent, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Open a streamed completion request.
    ///
    /// The credential check happens here, before any network I/O; a
    /// missing or blank key fails the send without touching the wire.
    pub fn open(&self, params: StreamParams) -> Result<(), ChatError> {
        if !params.relay.has_credential() {
            return Err(ChatError::Auth);
        }

        let tx = self.tx.clone();
        tokio::spawn(run_stream(params, tx));
        Ok(())
    }

    #[cfg(test)]
    pub fn send_for_test(&self, event: StreamEvent, stream_id: u64) {
        let _ = self.tx.send((event, stream_id));
    }
}

async fn run_stream(params: StreamParams, tx: mpsc::UnboundedSender<(StreamEvent, u64)>) {
    let StreamParams {
        client,
        relay,
        history,
        target_message_id,
        cancel_token,
        stream_id,
    } = params;

    let mut assembler = StreamAssembler::new(target_message_id);

    let request = ChatRequest {
        model: relay.model.clone(),
        messages: history,
        stream: true,
        temperature: relay.temperature,
    };
    let url = construct_api_url(&relay.base_url, "chat/completions");
    let api_key = relay.api_key.clone().unwrap_or_default();

    let send = client
        .post(url)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&request)
        .send();

    let response = tokio::select! {
        _ = cancel_token.cancelled() => {
            let _ = tx.send((assembler.fail(ChatError::Cancelled), stream_id));
            return;
        }
        result = send => match result {
            Ok(response) => response,
            Err(e) => {
                let status = e.status().map(|s| s.as_u16());
                let _ = tx.send((
                    assembler.fail(ChatError::network(status, e.to_string())),
                    stream_id,
                ));
                return;
            }
        }
    };

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        let detail = summarize_error_body(&body);
        debug!(stream_id, status, "relay refused completion request");
        let _ = tx.send((
            assembler.fail(ChatError::network(Some(status), detail)),
            stream_id,
        ));
        return;
    }

    let mut stream = response.bytes_stream();
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!(stream_id, "stream cancelled mid-flight");
                let _ = tx.send((assembler.fail(ChatError::Cancelled), stream_id));
                return;
            }
            next = stream.next() => match next {
                Some(Ok(chunk)) => {
                    for event in assembler.push(&chunk) {
                        let terminal = matches!(event, StreamEvent::Completed(_));
                        let _ = tx.send((event, stream_id));
                        if terminal {
                            return;
                        }
                    }
                }
                Some(Err(e)) => {
                    let status = e.status().map(|s| s.as_u16());
                    let _ = tx.send((
                        assembler.fail(ChatError::network(status, e.to_string())),
                        stream_id,
                    ));
                    return;
                }
                None => {
                    for event in assembler.finish() {
                        let _ = tx.send((event, stream_id));
                    }
                    return;
                }
            }
        }
    }
}
