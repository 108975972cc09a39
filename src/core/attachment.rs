//! Attachment ingestion: screening candidate files against the
//! configured policy and encoding survivors for transport.
//!
//! Screening and encoding are split so that an oversized batch can be
//! surfaced for confirmation before any bytes are read. A single file's
//! failure never aborts the rest of its batch.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::debug;

use crate::core::config::{DEFAULT_MAX_ATTACHMENTS_PER_BATCH, DEFAULT_MAX_ATTACHMENT_BYTES};
use crate::core::message::{Attachment, AttachmentPayload};
use crate::error::RejectReason;

/// Per-file and per-batch caps applied during screening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentLimits {
    pub max_attachment_bytes: u64,
    pub max_attachments_per_batch: usize,
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self {
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            max_attachments_per_batch: DEFAULT_MAX_ATTACHMENTS_PER_BATCH,
        }
    }
}

/// A candidate file handed to ingestion, before any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub name: String,
    pub path: PathBuf,
}

impl RawFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { name, path }
    }
}

/// Uploads attachment bytes on behalf of remote delivery and returns the
/// URL of the stored object.
#[async_trait]
pub trait AttachmentUploader: Send + Sync {
    async fn upload(
        &self,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// Encoding path for accepted files. Chosen at construction, applied to
/// every file in every batch.
#[derive(Clone)]
pub enum AttachmentDelivery {
    Inline,
    Remote(Arc<dyn AttachmentUploader>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub name: String,
    pub reason: RejectReason,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub accepted: Vec<Attachment>,
    pub rejected: Vec<Rejection>,
    /// Size-valid candidates held back because the batch exceeded the
    /// cap and no override was given. Re-submit them with
    /// [`AttachmentIngestor::ingest_with_override`] once confirmed.
    pub deferred: Vec<RawFile>,
    pub over_limit: bool,
}

fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('~')
}

pub struct AttachmentIngestor {
    limits: AttachmentLimits,
    delivery: AttachmentDelivery,
}

impl AttachmentIngestor {
    pub fn new(limits: AttachmentLimits, delivery: AttachmentDelivery) -> Self {
        Self { limits, delivery }
    }

    pub fn inline(limits: AttachmentLimits) -> Self {
        Self::new(limits, AttachmentDelivery::Inline)
    }

    pub fn remote(limits: AttachmentLimits, uploader: Arc<dyn AttachmentUploader>) -> Self {
        Self::new(limits, AttachmentDelivery::Remote(uploader))
    }

    pub fn limits(&self) -> AttachmentLimits {
        self.limits
    }

    /// Screen and encode a batch. An over-cap batch is returned intact in
    /// `deferred` with nothing encoded; the caller confirms and calls
    /// [`Self::ingest_with_override`].
    pub async fn ingest(&self, files: Vec<RawFile>) -> IngestReport {
        self.ingest_with_override(files, false).await
    }

    pub async fn ingest_with_override(
        &self,
        files: Vec<RawFile>,
        allow_oversized_batch: bool,
    ) -> IngestReport {
        let mut rejected = Vec::new();
        let mut eligible = Vec::new();

        for file in files {
            // Hidden/system files drop out before validation and are not
            // reported as rejections.
            if is_hidden_name(&file.name) {
                debug!(name = %file.name, "skipping hidden file");
                continue;
            }

            match fs::metadata(&file.path) {
                Ok(meta) if meta.len() > self.limits.max_attachment_bytes => {
                    rejected.push(Rejection {
                        name: file.name,
                        reason: RejectReason::TooLarge {
                            size: meta.len(),
                            limit: self.limits.max_attachment_bytes,
                        },
                    });
                }
                Ok(_) => eligible.push(file),
                Err(e) => rejected.push(Rejection {
                    name: file.name,
                    reason: RejectReason::Unreadable(e.to_string()),
                }),
            }
        }

        let over_limit = eligible.len() > self.limits.max_attachments_per_batch;
        if over_limit && !allow_oversized_batch {
            debug!(
                candidates = eligible.len(),
                cap = self.limits.max_attachments_per_batch,
                "deferring oversized batch pending confirmation"
            );
            return IngestReport {
                accepted: Vec::new(),
                rejected,
                deferred: eligible,
                over_limit: true,
            };
        }

        let mut accepted = Vec::new();
        for file in eligible {
            match self.encode(&file).await {
                Ok(attachment) => accepted.push(attachment),
                Err(reason) => rejected.push(Rejection {
                    name: file.name,
                    reason,
                }),
            }
        }

        IngestReport {
            accepted,
            rejected,
            deferred: Vec::new(),
            over_limit,
        }
    }

    async fn encode(&self, file: &RawFile) -> Result<Attachment, RejectReason> {
        let bytes = fs::read(&file.path).map_err(|e| RejectReason::Unreadable(e.to_string()))?;
        let size = bytes.len() as u64;
        let mime_type = guess_mime(&file.path);

        let payload = match &self.delivery {
            AttachmentDelivery::Inline => AttachmentPayload::Inline {
                data: BASE64.encode(&bytes),
            },
            AttachmentDelivery::Remote(uploader) => {
                let url = uploader
                    .upload(&file.name, &mime_type, bytes)
                    .await
                    .map_err(|e| RejectReason::UploadFailed(e.to_string()))?;
                AttachmentPayload::Remote { url }
            }
        };

        Ok(Attachment::new(&file.name, size, mime_type, payload))
    }
}

fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
