use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Speaker of a persisted conversation message.
///
/// Only the two roles that travel to the relay exist here; app-authored
/// transcript decoration stays on the embedding client's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }

    pub fn is_assistant(self) -> bool {
        self == Role::Assistant
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// Where an attachment's bytes live. Exactly one of the two; a record can
/// never carry both an inline body and an upload URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttachmentPayload {
    /// Base64-encoded content held in the message record itself.
    Inline { data: String },
    /// Content uploaded elsewhere, referenced by URL.
    Remote { url: String },
}

impl AttachmentPayload {
    pub fn is_inline(&self) -> bool {
        matches!(self, AttachmentPayload::Inline { .. })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, AttachmentPayload::Remote { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub name: String,
    /// Size of the original file in bytes, before any encoding.
    pub size: u64,
    pub mime_type: String,
    pub payload: AttachmentPayload,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
        payload: AttachmentPayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            payload,
        }
    }
}

/// One persisted conversation turn half. Immutable once written to the
/// store; the in-flight assistant message is assembled separately in
/// [`StreamState`] and only becomes a `Message` at a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            attachments,
            ..Self::new(Role::User, content)
        }
    }

    pub fn assistant(id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id,
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn is_assistant(&self) -> bool {
        self.role.is_assistant()
    }
}

/// Lifecycle of one in-flight assistant response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Pending,
    Streaming,
    Complete,
    Error,
}

impl StreamStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamStatus::Complete | StreamStatus::Error)
    }
}

/// Mutable state of the single in-flight assistant message, owned by the
/// stream assembler for the duration of one turn. Content only grows
/// until the status turns terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamState {
    pub target_message_id: Uuid,
    pub accumulated_content: String,
    pub status: StreamStatus,
}

impl StreamState {
    pub fn new(target_message_id: Uuid) -> Self {
        Self {
            target_message_id,
            accumulated_content: String::new(),
            status: StreamStatus::Pending,
        }
    }
}
