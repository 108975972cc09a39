//! Error taxonomy shared across the turn pipeline.
//!
//! Parse failures on individual stream lines are deliberately absent:
//! they are recovered inside the assembler (skip and continue) and never
//! surface to callers.

use thiserror::Error;

/// Terminal failures for a send/stream cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// No usable credential was configured. Raised before any network
    /// I/O; fatal to the current send only.
    #[error("no API credential available")]
    Auth,

    /// Non-success relay status or a transport failure. `status` is
    /// `None` when the connection failed before a status line arrived.
    #[error("completion request failed: {detail}")]
    Network { status: Option<u16>, detail: String },

    /// The stream was cancelled through the turn's cancellation token.
    #[error("stream cancelled")]
    Cancelled,

    /// A send was attempted while this conversation already had an
    /// active stream.
    #[error("a turn is already streaming for this conversation")]
    Concurrency,

    /// Durable storage failed. Callers downgrade this to a warning on
    /// turn updates; it never unwinds in-memory conversation state.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ChatError {
    pub fn network(status: Option<u16>, detail: impl Into<String>) -> Self {
        ChatError::Network {
            status,
            detail: detail.into(),
        }
    }
}

/// Failure reported by a [`ConversationStore`] implementation.
///
/// [`ConversationStore`]: crate::core::store::ConversationStore
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("conversation store failure: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(detail: impl Into<String>) -> Self {
        StoreError(detail.into())
    }
}

/// Per-file ingestion rejection. One file's failure never aborts the
/// rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("file is {size} bytes, over the {limit} byte attachment limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("file could not be read: {0}")]
    Unreadable(String),

    #[error("upload failed: {0}")]
    UploadFailed(String),
}
