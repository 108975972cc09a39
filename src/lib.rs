//! Palaver is the streaming turn pipeline for chat clients that talk to an
//! OpenAI-compatible completion relay.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the data model, attachment ingestion, message
//!   composition, the SSE stream assembler, persistence publication, and
//!   per-conversation turn orchestration.
//! - [`api`] defines the wire payloads exchanged with the relay.
//! - [`error`] carries the error taxonomy shared across the pipeline.
//! - [`utils`] holds URL construction and logging setup.
//!
//! The embedding client drives a turn through
//! [`core::turn::TurnController`]: it submits text plus ingested
//! attachments, owns the event receiver returned at construction, and
//! feeds each received event back into
//! [`core::turn::TurnController::handle_event`] to advance streaming
//! state and persistence. Durable storage and remote attachment upload
//! are supplied by the embedder as trait objects.

pub mod api;
pub mod core;
pub mod error;
pub mod utils;
