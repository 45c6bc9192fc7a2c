//! Data Transfer Objects for the monkai ingestion API.
//!
//! Field names are `snake_case` on the wire, same as in Rust.

use std::ops::Range;

use mt_domain::records::LogLevel;
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Uploads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POST /records/upload and POST /logs/upload: response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub inserted_count: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One chunk of a batch upload that was not delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    /// Index of the chunk's first item in the uploaded slice.
    pub first_record: usize,
    pub record_count: usize,
    pub error: String,
}

impl ChunkFailure {
    /// Positions of the failed items in the uploaded slice.
    pub fn range(&self) -> Range<usize> {
        self.first_record..self.first_record + self.record_count
    }
}

/// Outcome of a chunked batch upload.  Partial failure is reported here,
/// never as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub total_inserted: u64,
    pub total_records: usize,
    #[serde(default)]
    pub failures: Vec<ChunkFailure>,
}

impl UploadSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_records(&self) -> usize {
        self.failures.iter().map(|f| f.record_count).sum()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn default_limit() -> u32 {
    100
}

/// Filters for POST /record_query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordQuery {
    #[serde(skip)]
    pub namespace: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// ISO-8601 lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// ISO-8601 upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl RecordQuery {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            limit: default_limit(),
            offset: 0,
            agent: None,
            session_id: None,
            start_date: None,
            end_date: None,
        }
    }
}

/// Request body for POST /record_query: filters nest under `query`.
#[derive(Debug, Serialize)]
pub(crate) struct RecordQueryBody<'a> {
    pub namespace: &'a str,
    pub query: &'a RecordQuery,
}

/// POST /record_query: response body.  Rows are passed through as the
/// server returns them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordQueryResponse {
    #[serde(default)]
    pub records: Vec<serde_json::Value>,
    #[serde(default)]
    pub count: Option<u64>,
}

/// POST /logs/query: request body (flat, unlike record queries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogQuery {
    pub namespace: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl LogQuery {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            limit: default_limit(),
            offset: 0,
            level: None,
            resource_id: None,
            start_date: None,
            end_date: None,
        }
    }
}

/// POST /logs/query: response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogQueryResponse {
    #[serde(default)]
    pub logs: Vec<serde_json::Value>,
    #[serde(default)]
    pub count: Option<u64>,
}
