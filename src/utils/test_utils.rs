//! Shared test doubles for the pipeline's external collaborators.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::attachment::AttachmentUploader;
use crate::core::store::{ConversationStore, MessageRecord};
use crate::error::StoreError;

/// In-memory append-only conversation log.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<MessageRecord>>,
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn append(&self, record: MessageRecord) -> Result<(), StoreError> {
        self.rows.lock().unwrap().push(record);
        Ok(())
    }

    async fn list(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.conversation_id == conversation_id)
            .cloned()
            .collect())
    }
}

/// Store whose every operation fails, for exercising the
/// warn-and-continue persistence path.
pub struct FailingStore;

#[async_trait]
impl ConversationStore for FailingStore {
    async fn append(&self, _record: MessageRecord) -> Result<(), StoreError> {
        Err(StoreError::new("store offline"))
    }

    async fn list(&self, _conversation_id: &str) -> Result<Vec<MessageRecord>, StoreError> {
        Err(StoreError::new("store offline"))
    }
}

/// Uploader that records names and answers with a deterministic URL.
#[derive(Default)]
pub struct RecordingUploader {
    names: Mutex<Vec<String>>,
}

impl RecordingUploader {
    pub fn uploaded_names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttachmentUploader for RecordingUploader {
    async fn upload(
        &self,
        name: &str,
        _mime_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        self.names.lock().unwrap().push(name.to_string());
        Ok(format!("https://uploads.test/{name}"))
    }
}

/// Uploader that rejects one specific file name and accepts the rest.
pub struct FailingUploader {
    reject: String,
}

impl FailingUploader {
    pub fn rejecting(name: impl Into<String>) -> Self {
        Self {
            reject: name.into(),
        }
    }
}

#[async_trait]
impl AttachmentUploader for FailingUploader {
    async fn upload(
        &self,
        name: &str,
        _mime_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        if name == self.reject {
            return Err("upload endpoint rejected the file".into());
        }
        Ok(format!("https://uploads.test/{name}"))
    }
}
