use serde::Serialize;

/// Structured trace events emitted across all monkai-trace crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        namespace: String,
        user_id: String,
        session_id: String,
        is_new: bool,
        /// `"local"` when decided in-process, `"remote"` when the server decided.
        source: &'static str,
    },
    SessionExpired {
        user_id: String,
        session_id: String,
        idle_secs: i64,
    },
    SessionFallback {
        user_id: String,
        reason: String,
    },
    SessionsSwept {
        removed: usize,
        remaining: usize,
    },
    ApiCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
        attempt: u32,
    },
    BatchFlushed {
        kind: &'static str,
        records: usize,
        inserted: u64,
        failed_chunks: usize,
    },
    BatchFlushFailed {
        kind: &'static str,
        retained: usize,
        error: String,
    },
    RecordFinalized {
        agent: String,
        session_id: Option<String>,
        messages: usize,
        total_tokens: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "mt_event");
    }
}
