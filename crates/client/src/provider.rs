//! Transport seams: [`IngestApi`] for the ingestion API surface and
//! [`RecordSink`] for whatever a batcher flushes into.

use async_trait::async_trait;
use mt_domain::error::Result;
use mt_domain::records::{ConversationRecord, LogEntry};

use crate::types::{
    LogQuery, LogQueryResponse, RecordQuery, RecordQueryResponse, UploadResponse, UploadSummary,
};

/// Abstraction over the monkai ingestion API.
///
/// Implementations may talk to the real REST API or be a test double.
/// Every method issues exactly one request; chunking lives above this.
#[async_trait]
pub trait IngestApi: Send + Sync {
    /// Upload records in one request (POST /records/upload).
    async fn upload_records(&self, records: &[ConversationRecord]) -> Result<UploadResponse>;

    /// Upload log entries in one request (POST /logs/upload).
    async fn upload_logs(&self, logs: &[LogEntry]) -> Result<UploadResponse>;

    /// Filtered, paginated record listing (POST /record_query).
    async fn query_records(&self, query: &RecordQuery) -> Result<RecordQueryResponse>;

    /// Filtered, paginated log listing (POST /logs/query).
    async fn query_logs(&self, query: &LogQuery) -> Result<LogQueryResponse>;
}

/// Destination of a batcher flush.
///
/// `Err` means nothing was delivered.  `Ok` with a non-empty
/// [`UploadSummary::failures`] means exactly the listed chunks were not.
#[async_trait]
pub trait RecordSink<T>: Send + Sync {
    async fn send(&self, items: &[T]) -> Result<UploadSummary>;
}
