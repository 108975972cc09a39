//! Per-conversation turn orchestration.
//!
//! A [`TurnController`] owns the single-flight guard for one
//! conversation: compose, persist the user half, open the stream, then
//! fold stream events back into transcript and storage. The embedder
//! owns the event receiver returned by [`TurnController::new`] and calls
//! [`TurnController::handle_event`] for every `(event, stream_id)` pair
//! it reads.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::api::ChatMessage;
use crate::core::chat_stream::{ChatStreamService, StreamEvent, StreamParams};
use crate::core::compose::compose;
use crate::core::config::RelayConfig;
use crate::core::message::{Attachment, Message};
use crate::core::store::{ConversationStore, PersistencePublisher};
use crate::error::{ChatError, StoreError};

/// Result of submitting input to [`TurnController::send`].
#[derive(Debug)]
pub enum SendOutcome {
    /// Empty text and no attachments; nothing was sent or persisted.
    Noop,
    Started {
        user_message: Message,
        stream_id: u64,
        /// Set when the user row failed to persist; the turn still runs.
        persistence_warning: Option<String>,
    },
}

/// What the embedder should render after feeding an event back in.
#[derive(Debug)]
pub enum TurnUpdate {
    /// Full accumulated assistant text so far; render by replacement.
    Delta { content: String },
    Completed {
        message: Message,
        persistence_warning: Option<String>,
    },
    Failed {
        /// Accumulated content at the point of failure; already appended
        /// to the transcript and persisted when non-empty.
        partial: String,
        error: ChatError,
        persistence_warning: Option<String>,
    },
}

pub struct TurnController {
    conversation_id: String,
    relay: RelayConfig,
    http: reqwest::Client,
    store: Arc<dyn ConversationStore>,
    publisher: PersistencePublisher,
    service: ChatStreamService,
    transcript: Vec<Message>,
    busy: bool,
    current_stream_id: u64,
    cancel_token: CancellationToken,
    target_message_id: Option<Uuid>,
}

impl TurnController {
    pub fn new(
        conversation_id: impl Into<String>,
        relay: RelayConfig,
        store: Arc<dyn ConversationStore>,
    ) -> (Self, mpsc::UnboundedReceiver<(StreamEvent, u64)>) {
        let (service, rx) = ChatStreamService::new();
        let controller = Self {
            conversation_id: conversation_id.into(),
            relay,
            http: reqwest::Client::new(),
            publisher: PersistencePublisher::new(store.clone()),
            store,
            service,
            transcript: Vec::new(),
            busy: false,
            current_stream_id: 0,
            cancel_token: CancellationToken::new(),
            target_message_id: None,
        };
        (controller, rx)
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Rebuild the in-memory transcript from the durable log. Meant for
    /// view-open time; unlike mid-turn persistence, a failure here is
    /// returned to the caller.
    pub async fn hydrate(&mut self) -> Result<(), StoreError> {
        let records = self.store.list(&self.conversation_id).await?;
        let mut transcript = Vec::with_capacity(records.len());
        for record in records {
            transcript.push(record.into_message()?);
        }
        self.transcript = transcript;
        Ok(())
    }

    /// Submit one user turn. Rejected with [`ChatError::Concurrency`]
    /// while a previous turn is still streaming.
    pub async fn send(
        &mut self,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<SendOutcome, ChatError> {
        if self.busy {
            return Err(ChatError::Concurrency);
        }

        let Some(user_message) = compose(text, attachments) else {
            return Ok(SendOutcome::Noop);
        };

        // The user half is durable before the stream opens, so a crash
        // mid-stream cannot lose it.
        let persistence_warning = self
            .publisher
            .publish_user(&self.conversation_id, &user_message)
            .await
            .err()
            .map(|e| e.to_string());

        self.transcript.push(user_message.clone());

        let stream_id = self.current_stream_id + 1;
        let target_message_id = Uuid::new_v4();
        let cancel_token = CancellationToken::new();

        self.service.open(StreamParams {
            client: self.http.clone(),
            relay: self.relay.clone(),
            history: self.wire_history(),
            target_message_id,
            cancel_token: cancel_token.clone(),
            stream_id,
        })?;

        self.current_stream_id = stream_id;
        self.busy = true;
        self.cancel_token = cancel_token;
        self.target_message_id = Some(target_message_id);

        Ok(SendOutcome::Started {
            user_message,
            stream_id,
            persistence_warning,
        })
    }

    /// Stop the in-flight stream. The turn settles when the resulting
    /// cancellation event comes back through [`Self::handle_event`].
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Advance turn state with one event read from the receiver. Events
    /// from superseded streams are dropped.
    pub async fn handle_event(
        &mut self,
        event: StreamEvent,
        stream_id: u64,
    ) -> Option<TurnUpdate> {
        if stream_id != self.current_stream_id {
            debug!(
                stream_id,
                current = self.current_stream_id,
                "dropping event from superseded stream"
            );
            return None;
        }

        match event {
            StreamEvent::Update(content) => Some(TurnUpdate::Delta { content }),
            StreamEvent::Completed(content) => {
                self.busy = false;
                let target = self.target_message_id.take().unwrap_or_else(Uuid::new_v4);
                let message = Message::assistant(target, content);
                let persistence_warning = self
                    .publisher
                    .publish_assistant(&self.conversation_id, &message)
                    .await
                    .err()
                    .map(|e| e.to_string());
                self.transcript.push(message.clone());
                Some(TurnUpdate::Completed {
                    message,
                    persistence_warning,
                })
            }
            StreamEvent::Failed { partial, error } => {
                self.busy = false;
                let target = self.target_message_id.take();
                let mut persistence_warning = None;
                // Partial content survives the failure; an errored turn
                // that produced nothing leaves no assistant row.
                if !partial.is_empty() {
                    let message =
                        Message::assistant(target.unwrap_or_else(Uuid::new_v4), partial.clone());
                    persistence_warning = self
                        .publisher
                        .publish_assistant(&self.conversation_id, &message)
                        .await
                        .err()
                        .map(|e| e.to_string());
                    self.transcript.push(message);
                }
                Some(TurnUpdate::Failed {
                    partial,
                    error,
                    persistence_warning,
                })
            }
        }
    }

    fn wire_history(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::new();

        if let Some(prompt) = self
            .relay
            .system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
        {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: prompt.to_string(),
            });
        }

        for message in &self.transcript {
            messages.push(ChatMessage {
                role: message.role.as_str().to_string(),
                content: message.content.clone(),
            });
        }

        messages
    }

    #[cfg(test)]
    pub(crate) fn service(&self) -> &ChatStreamService {
        &self.service
    }

    /// Test seam: run everything `send` does short of opening the
    /// network stream, so tests can inject events for this turn.
    #[cfg(test)]
    pub(crate) async fn begin_turn_for_test(
        &mut self,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> (Message, u64) {
        assert!(!self.busy, "begin_turn_for_test on a busy controller");
        let user_message = compose(text, attachments).expect("test turn composed to nothing");
        let _ = self
            .publisher
            .publish_user(&self.conversation_id, &user_message)
            .await;
        self.transcript.push(user_message.clone());

        self.current_stream_id += 1;
        self.busy = true;
        self.cancel_token = CancellationToken::new();
        self.target_message_id = Some(Uuid::new_v4());
        (user_message, self.current_stream_id)
    }

    #[cfg(test)]
    pub(crate) fn wire_history_for_test(&self) -> Vec<ChatMessage> {
        self.wire_history()
    }
}
