//! `mt-client`: transport to the monkai ingestion API.
//!
//! Provides the [`IngestApi`] trait over the API surface, a production REST
//! implementation ([`RestIngestClient`]) with retry and back-off, chunked
//! batch upload with a per-chunk [`UploadSummary`], typed DTOs, and loaders
//! for exported JSON files.
//!
//! `RestIngestClient` also implements
//! [`RemoteSessionResolver`](mt_sessions::RemoteSessionResolver) for the
//! two-tier session manager and [`RecordSink`] for the batcher.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mt_client::RestIngestClient;
//! use mt_domain::config::ClientConfig;
//! use mt_domain::records::{ConversationRecord, Message};
//!
//! # async fn example() -> mt_domain::error::Result<()> {
//! let client = RestIngestClient::new(&ClientConfig::with_token("tk_..."))?;
//!
//! let mut record = ConversationRecord::new("support", "triage");
//! record.msg.push(Message::user("where is my order?"));
//!
//! let summary = client.upload_records_batch(&[record]).await;
//! println!("inserted {}", summary.total_inserted);
//! # Ok(())
//! # }
//! ```

pub mod chunked;
pub mod files;
pub mod provider;
pub mod rest;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use chunked::upload_in_chunks;
pub use provider::{IngestApi, RecordSink};
pub use rest::{from_reqwest, RestIngestClient, TOKEN_HEADER};
pub use types::{
    ChunkFailure, LogQuery, LogQueryResponse, RecordQuery, RecordQueryResponse, UploadResponse,
    UploadSummary,
};
