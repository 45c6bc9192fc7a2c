//! Integration test: boots an in-process HTTP server that stands in for the
//! ingestion API and drives a real [`RestIngestClient`] against it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use mt_client::{IngestApi, LogQuery, RecordQuery, RecordSink, RestIngestClient, TOKEN_HEADER};
use mt_domain::config::ClientConfig;
use mt_domain::error::Error;
use mt_domain::records::{ConversationRecord, LogEntry, LogLevel, Message};
use mt_sessions::PersistentSessionManager;

// ── Stand-in API ────────────────────────────────────────────────────────

#[derive(Default)]
struct MockApi {
    /// (path, tracer_token header, body) per request.
    seen: parking_lot::Mutex<Vec<(String, Option<String>, Value)>>,
    /// Answer this many requests with 503 before behaving.
    fail_first: AtomicUsize,
    /// Answer every request with this status.
    force_status: parking_lot::Mutex<Option<u16>>,
}

impl MockApi {
    fn capture(&self, path: &str, headers: &HeaderMap, body: &Value) -> Option<StatusCode> {
        let token = headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        self.seen.lock().push((path.to_owned(), token, body.clone()));

        if self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Some(StatusCode::SERVICE_UNAVAILABLE);
        }
        let forced = *self.force_status.lock();
        forced.and_then(|s| StatusCode::from_u16(s).ok())
    }

    fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

type Reply = (StatusCode, Json<Value>);

fn forced(status: StatusCode) -> Reply {
    (status, Json(json!({ "error": "forced" })))
}

async fn upload_records(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    if let Some(status) = api.capture("/records/upload", &headers, &body) {
        return forced(status);
    }
    let records = body["records"].as_array().cloned().unwrap_or_default();
    if records.iter().any(|r| r["agent"] == "poison") {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "invalid record" })),
        );
    }
    (
        StatusCode::CREATED,
        Json(json!({ "inserted_count": records.len() })),
    )
}

async fn upload_logs(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    if let Some(status) = api.capture("/logs/upload", &headers, &body) {
        return forced(status);
    }
    let n = body["logs"].as_array().map(Vec::len).unwrap_or(0);
    (StatusCode::OK, Json(json!({ "inserted_count": n })))
}

async fn get_or_create(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    if let Some(status) = api.capture("/sessions/get-or-create", &headers, &body) {
        return forced(status);
    }
    let user = body["user_id"].as_str().unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "session_id": format!("srv-{user}"),
            "reused": false,
            "created_at": "2026-03-02T09:30:00Z"
        })),
    )
}

async fn record_query(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let _ = api.capture("/record_query", &headers, &body);
    (
        StatusCode::OK,
        Json(json!({ "records": [{ "id": 1, "agent": "triage" }], "count": 1 })),
    )
}

async fn logs_query(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let _ = api.capture("/logs/query", &headers, &body);
    (StatusCode::OK, Json(json!({ "logs": [], "count": 0 })))
}

/// Boots the stand-in API on an ephemeral port and returns its base URL.
async fn start_mock_api(api: Arc<MockApi>) -> String {
    let app = Router::new()
        .route("/records/upload", post(upload_records))
        .route("/logs/upload", post(upload_logs))
        .route("/sessions/get-or-create", post(get_or_create))
        .route("/record_query", post(record_query))
        .route("/logs/query", post(logs_query))
        .with_state(api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn client_with(api: Arc<MockApi>, tweak: impl FnOnce(&mut ClientConfig)) -> RestIngestClient {
    let mut cfg = ClientConfig::with_token("tk_test");
    cfg.base_url = start_mock_api(api).await;
    cfg.timeout_ms = 5_000;
    tweak(&mut cfg);
    RestIngestClient::new(&cfg).unwrap()
}

fn record(agent: &str) -> ConversationRecord {
    let mut r = ConversationRecord::new("support", agent);
    r.msg.push(Message::user("hello"));
    r
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_sends_token_and_wraps_records() {
    let api = Arc::new(MockApi::default());
    let client = client_with(api.clone(), |_| {}).await;

    let resp = client.upload_record(&record("triage")).await.unwrap();
    assert_eq!(resp.inserted_count, 1);

    let seen = api.seen.lock();
    let (path, token, body) = &seen[0];
    assert_eq!(path, "/records/upload");
    assert_eq!(token.as_deref(), Some("tk_test"));
    assert_eq!(body["records"][0]["agent"], "triage");
    assert_eq!(body["records"][0]["msg"][0]["role"], "user");
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let api = Arc::new(MockApi::default());
    api.fail_first.store(2, Ordering::SeqCst);
    let client = client_with(api.clone(), |c| c.max_retries = 3).await;

    let resp = client
        .upload_log(&LogEntry::new("support", LogLevel::Info, "ok"))
        .await
        .unwrap();
    assert_eq!(resp.inserted_count, 1);
    assert_eq!(api.calls(), 3);
}

#[tokio::test]
async fn retries_are_bounded() {
    let api = Arc::new(MockApi::default());
    *api.force_status.lock() = Some(500);
    let client = client_with(api.clone(), |c| c.max_retries = 1).await;

    let err = client.upload_record(&record("triage")).await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 500, .. }));
    assert!(err.is_transient());
    assert_eq!(api.calls(), 2);
}

#[tokio::test]
async fn rejected_token_is_auth_error_without_retry() {
    let api = Arc::new(MockApi::default());
    *api.force_status.lock() = Some(401);
    let client = client_with(api.clone(), |c| c.max_retries = 3).await;

    let err = client.upload_record(&record("triage")).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert_eq!(api.calls(), 1);
    assert!(!client.test_connection().await);
}

#[tokio::test]
async fn client_errors_are_permanent() {
    let api = Arc::new(MockApi::default());
    let client = client_with(api.clone(), |c| c.max_retries = 3).await;

    let err = client.upload_record(&record("poison")).await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 422, .. }));
    assert!(!err.is_transient());
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn batch_upload_reports_failed_chunks() {
    let api = Arc::new(MockApi::default());
    let client = client_with(api.clone(), |c| {
        c.chunk_size = 2;
        c.max_retries = 0;
    })
    .await;

    let records = vec![
        record("a"),
        record("b"),
        record("poison"),
        record("c"),
        record("d"),
    ];
    let summary = client.upload_records_batch(&records).await;

    assert_eq!(api.calls(), 3);
    assert_eq!(summary.total_records, 5);
    assert_eq!(summary.total_inserted, 3);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].chunk_index, 1);
    assert_eq!(summary.failures[0].range(), 2..4);

    // The sink view of the same client reports the same thing.
    let via_sink = RecordSink::<ConversationRecord>::send(&client, &records)
        .await
        .unwrap();
    assert_eq!(via_sink.failed_records(), 2);
}

#[tokio::test]
async fn queries_use_their_wire_shapes() {
    let api = Arc::new(MockApi::default());
    let client = client_with(api.clone(), |_| {}).await;

    let mut q = RecordQuery::new("support");
    q.session_id = Some("support-u1-20260302-093000".into());
    let records = client.query_records(&q).await.unwrap();
    assert_eq!(records.count, Some(1));
    assert_eq!(records.records[0]["agent"], "triage");

    let mut lq = LogQuery::new("support");
    lq.level = Some(LogLevel::Error);
    let logs = client.query_logs(&lq).await.unwrap();
    assert!(logs.logs.is_empty());

    let seen = api.seen.lock();
    assert_eq!(seen[0].2["namespace"], "support");
    assert_eq!(seen[0].2["query"]["session_id"], "support-u1-20260302-093000");
    assert_eq!(seen[1].2["level"], "error");
    assert_eq!(seen[1].2["limit"], 100);
}

#[tokio::test]
async fn two_tier_manager_resolves_through_the_api() {
    let api = Arc::new(MockApi::default());
    let client = Arc::new(client_with(api.clone(), |_| {}).await);
    let mgr = PersistentSessionManager::new(client, Duration::from_secs(90));

    let sid = mgr.resolve_or_create("u1", "support", false).await;
    assert_eq!(sid, "srv-u1");
    assert_eq!(mgr.resolve_or_create("u1", "support", false).await, "srv-u1");
    assert_eq!(api.calls(), 1);

    let seen = api.seen.lock();
    assert_eq!(
        seen[0].2,
        json!({
            "namespace": "support",
            "user_id": "u1",
            "inactivity_timeout": 90,
            "force_new": false
        })
    );
}

#[tokio::test]
async fn unavailable_api_degrades_to_local_sessions() {
    let api = Arc::new(MockApi::default());
    *api.force_status.lock() = Some(503);
    let client = Arc::new(client_with(api.clone(), |c| c.max_retries = 0).await);
    let mgr = PersistentSessionManager::new(client, Duration::from_secs(90));

    let sid = mgr.resolve_or_create("u1", "support", false).await;
    assert!(sid.starts_with("support-u1-"));
}
