//! Durable conversation log boundary and the publisher that writes
//! finalized turn halves through it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::core::message::{Attachment, Message, Role};
use crate::error::StoreError;

/// One row of the hosted conversation log. `attachments` holds a
/// serialized JSON array, or nothing when the message had none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub attachments: Option<String>,
}

impl MessageRecord {
    pub fn from_message(conversation_id: &str, message: &Message) -> Result<Self, StoreError> {
        let attachments = if message.attachments.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&message.attachments)
                    .map_err(|e| StoreError::new(e.to_string()))?,
            )
        };

        Ok(Self {
            id: message.id,
            conversation_id: conversation_id.to_string(),
            role: message.role,
            content: message.content.clone(),
            created_at: message.timestamp,
            attachments,
        })
    }

    pub fn into_message(self) -> Result<Message, StoreError> {
        let attachments: Vec<Attachment> = match self.attachments {
            Some(json) => {
                serde_json::from_str(&json).map_err(|e| StoreError::new(e.to_string()))?
            }
            None => Vec::new(),
        };

        Ok(Message {
            id: self.id,
            role: self.role,
            content: self.content,
            timestamp: self.created_at,
            attachments,
        })
    }
}

/// Append-only message log kept by the hosting application. `list`
/// returns rows in insertion order; implementations must not reorder or
/// deduplicate.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append(&self, record: MessageRecord) -> Result<(), StoreError>;
    async fn list(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, StoreError>;
}

/// Writes finalized messages into the store. The user half goes in
/// immediately after composition; the assistant half exactly once, at
/// completion or terminal error. Failures are logged and propagated for
/// the caller to downgrade; nothing here retries or rolls back.
#[derive(Clone)]
pub struct PersistencePublisher {
    store: Arc<dyn ConversationStore>,
}

impl PersistencePublisher {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    pub async fn publish_user(
        &self,
        conversation_id: &str,
        message: &Message,
    ) -> Result<(), StoreError> {
        debug_assert!(message.is_user());
        self.append(conversation_id, message).await
    }

    pub async fn publish_assistant(
        &self,
        conversation_id: &str,
        message: &Message,
    ) -> Result<(), StoreError> {
        debug_assert!(message.is_assistant());
        self.append(conversation_id, message).await
    }

    async fn append(&self, conversation_id: &str, message: &Message) -> Result<(), StoreError> {
        let record = MessageRecord::from_message(conversation_id, message)?;
        if let Err(e) = self.store.append(record).await {
            warn!(
                conversation_id,
                role = message.role.as_str(),
                error = %e,
                "failed to persist message"
            );
            return Err(e);
        }
        Ok(())
    }
}
