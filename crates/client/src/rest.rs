//! REST implementation of [`IngestApi`].
//!
//! `RestIngestClient` wraps a `reqwest::Client` and translates every call
//! into a JSON `POST` against the monkai ingestion API, with automatic
//! retry + exponential back-off on transient (5xx / timeout / connect)
//! failures.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use mt_domain::config::ClientConfig;
use mt_domain::error::{Error, Result};
use mt_domain::records::{ConversationRecord, LogEntry, LogLevel};
use mt_domain::trace::TraceEvent;
use mt_sessions::{RemoteSessionResolver, ResolvedSession, SessionLookup};

use crate::chunked::upload_in_chunks;
use crate::provider::{IngestApi, RecordSink};
use crate::types::{
    LogQuery, LogQueryResponse, RecordQuery, RecordQueryBody, RecordQueryResponse,
    UploadResponse, UploadSummary,
};

/// Header carrying the tracer token on every request.
pub const TOKEN_HEADER: &str = "tracer_token";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST client for the monkai ingestion API.
///
/// Created once and shared (it is cheap to clone).  The underlying
/// `reqwest::Client` maintains a connection pool.
#[derive(Clone)]
pub struct RestIngestClient {
    http: Client,
    base_url: String,
    tracer_token: String,
    timeout: Duration,
    max_retries: u32,
    chunk_size: usize,
}

impl std::fmt::Debug for RestIngestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestIngestClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl RestIngestClient {
    /// Build a new client.  A missing tracer token, a non-HTTP base URL or
    /// a zero chunk size is a configuration error.
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let tracer_token = cfg.resolve_token().ok_or_else(|| {
            Error::Config(format!(
                "no tracer token configured (set client.tracer_token or ${})",
                cfg.token_env
            ))
        })?;
        if !(cfg.base_url.starts_with("http://") || cfg.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "client.base_url must be an http(s) URL, got {:?}",
                cfg.base_url
            )));
        }
        if cfg.chunk_size == 0 {
            return Err(Error::Config(
                "client.chunk_size must be greater than 0".into(),
            ));
        }

        let timeout = Duration::from_millis(cfg.timeout_ms);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            tracer_token,
            timeout,
            max_retries: cfg.max_retries,
            chunk_size: cfg.chunk_size,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    // ── request helpers ──────────────────────────────────────────────

    /// Decorate a `RequestBuilder` with the standard headers.
    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.header(TOKEN_HEADER, &self.tracer_token)
            .header("X-Client-Type", "monkai-trace-rs")
            .header("X-Trace-Id", Uuid::new_v4().to_string())
    }

    /// Build the full URL for a path like `/records/upload`.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST `body` as JSON to `path` and decode the JSON answer.
    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let endpoint = format!("POST {path}");
        let resp = self
            .execute_with_retry(&endpoint, || self.http.post(&url).json(body))
            .await?;

        let text = resp.text().await.map_err(from_reqwest)?;
        // Some endpoints answer 201 with no body.
        let text = if text.trim().is_empty() {
            "{}".to_owned()
        } else {
            text
        };
        serde_json::from_str(&text).map_err(|e| {
            Error::Other(format!("failed to parse {endpoint} response: {e}: {text}"))
        })
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Execute a request with retry + exponential back-off on transient errors.
    ///
    /// * Retries on 5xx status codes, timeouts and connection errors.
    /// * Does **not** retry on 4xx (client errors are permanent).
    /// * Emits a `TraceEvent::ApiCall` after every attempt.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tracing::debug!(endpoint, attempt, ?backoff, "retrying ingestion request");
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let result = self.decorate(build_request()).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    TraceEvent::ApiCall {
                        endpoint: endpoint.to_owned(),
                        status,
                        duration_ms,
                        attempt: attempt + 1,
                    }
                    .emit();

                    if resp.status().is_server_error() {
                        // 5xx: transient, retry
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::Api {
                            endpoint: endpoint.to_owned(),
                            status,
                            body,
                        });
                        continue;
                    }

                    if resp.status().is_client_error() {
                        // 4xx: permanent, do NOT retry
                        let resp_status = resp.status();
                        let body = resp.text().await.unwrap_or_default();
                        if resp_status == StatusCode::UNAUTHORIZED
                            || resp_status == StatusCode::FORBIDDEN
                        {
                            return Err(Error::Auth(format!(
                                "{endpoint} rejected the tracer token ({status}): {body}"
                            )));
                        }
                        return Err(Error::Api {
                            endpoint: endpoint.to_owned(),
                            status,
                            body,
                        });
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    let status = e.status().map(|s| s.as_u16()).unwrap_or(0);

                    TraceEvent::ApiCall {
                        endpoint: endpoint.to_owned(),
                        status,
                        duration_ms,
                        attempt: attempt + 1,
                    }
                    .emit();

                    last_err = Some(from_reqwest(e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Other(format!("{endpoint}: all retries exhausted"))))
    }

    // ── high-level operations ────────────────────────────────────────

    /// Upload a single record.
    pub async fn upload_record(&self, record: &ConversationRecord) -> Result<UploadResponse> {
        self.upload_records(std::slice::from_ref(record)).await
    }

    /// Upload a single log entry.
    pub async fn upload_log(&self, log: &LogEntry) -> Result<UploadResponse> {
        self.upload_logs(std::slice::from_ref(log)).await
    }

    /// Upload records in `chunk_size` requests.  Failed chunks are listed in
    /// the summary; later chunks are still attempted.
    pub async fn upload_records_batch(&self, records: &[ConversationRecord]) -> UploadSummary {
        upload_in_chunks(records, self.chunk_size, |chunk| self.upload_records(chunk)).await
    }

    /// Upload log entries in `chunk_size` requests.
    pub async fn upload_logs_batch(&self, logs: &[LogEntry]) -> UploadSummary {
        upload_in_chunks(logs, self.chunk_size, |chunk| self.upload_logs(chunk)).await
    }

    /// Check that the API is reachable and accepts the token by uploading a
    /// minimal log line.
    pub async fn test_connection(&self) -> bool {
        let entry = LogEntry::new("test", LogLevel::Info, "Connection test");
        match self.upload_log(&entry).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "connection test failed");
                false
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl IngestApi for RestIngestClient {
    async fn upload_records(&self, records: &[ConversationRecord]) -> Result<UploadResponse> {
        self.post_json("/records/upload", &serde_json::json!({ "records": records }))
            .await
    }

    async fn upload_logs(&self, logs: &[LogEntry]) -> Result<UploadResponse> {
        self.post_json("/logs/upload", &serde_json::json!({ "logs": logs }))
            .await
    }

    async fn query_records(&self, query: &RecordQuery) -> Result<RecordQueryResponse> {
        let body = RecordQueryBody {
            namespace: &query.namespace,
            query,
        };
        self.post_json("/record_query", &body).await
    }

    async fn query_logs(&self, query: &LogQuery) -> Result<LogQueryResponse> {
        self.post_json("/logs/query", query).await
    }
}

#[async_trait]
impl RemoteSessionResolver for RestIngestClient {
    async fn get_or_create_session(&self, lookup: &SessionLookup) -> Result<ResolvedSession> {
        self.post_json("/sessions/get-or-create", lookup).await
    }
}

#[async_trait]
impl RecordSink<ConversationRecord> for RestIngestClient {
    async fn send(&self, items: &[ConversationRecord]) -> Result<UploadSummary> {
        Ok(self.upload_records_batch(items).await)
    }
}

#[async_trait]
impl RecordSink<LogEntry> for RestIngestClient {
    async fn send(&self, items: &[LogEntry]) -> Result<UploadSummary> {
        Ok(self.upload_logs_batch(items).await)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a `reqwest::Error` into a domain `Error`.
///
/// Timeout errors become `Error::Timeout`; everything else becomes
/// `Error::Http`.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ClientConfig {
        ClientConfig::with_token("tk_test")
    }

    #[test]
    fn missing_token_is_fatal() {
        let mut c = ClientConfig::default();
        c.token_env = "MT_REST_TEST_UNSET_TOKEN".into();
        assert!(matches!(RestIngestClient::new(&c), Err(Error::Config(_))));
    }

    #[test]
    fn bad_base_url_is_fatal() {
        let mut c = cfg();
        c.base_url = "ftp://example.com".into();
        assert!(matches!(RestIngestClient::new(&c), Err(Error::Config(_))));
    }

    #[test]
    fn zero_chunk_size_is_fatal() {
        let mut c = cfg();
        c.chunk_size = 0;
        assert!(matches!(RestIngestClient::new(&c), Err(Error::Config(_))));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let mut c = cfg();
        c.base_url = "http://localhost:9000/api/".into();
        let client = RestIngestClient::new(&c).unwrap();
        assert_eq!(client.url("/records/upload"), "http://localhost:9000/api/records/upload");
    }

    #[test]
    fn debug_hides_token() {
        let client = RestIngestClient::new(&cfg()).unwrap();
        assert!(!format!("{client:?}").contains("tk_test"));
    }
}
