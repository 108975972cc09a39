use crate::core::message::{Attachment, Message};

/// Combine pending input text and already-ingested attachments into an
/// outbound user message.
///
/// Returns `None` for a no-op send: whitespace-only text with no
/// attachments. Ingestion must be finished before composition; this
/// never triggers encoding.
pub fn compose(text: &str, attachments: Vec<Attachment>) -> Option<Message> {
    let trimmed = text.trim();
    if trimmed.is_empty() && attachments.is_empty() {
        return None;
    }
    Some(Message::user(trimmed, attachments))
}
