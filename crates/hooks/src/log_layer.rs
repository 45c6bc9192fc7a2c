//! Forwarding of application `tracing` events to the ingestion API.
//!
//! [`IngestLogLayer`] turns every event at or above the configured level
//! into a [`LogEntry`] and hands it over a channel to a drain task, which
//! enqueues it into a `TelemetryBatcher<LogEntry>`.  The layer itself never
//! blocks or awaits.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use mt_domain::config::LoggingConfig;
use mt_domain::records::{LogEntry, LogLevel};

use crate::batcher::TelemetryBatcher;

/// Targets whose events are never forwarded: the SDK's own transport and
/// trace events would otherwise feed back into the upload path.
const SKIPPED_TARGETS: &[&str] = &[
    "mt_domain",
    "mt_client",
    "mt_hooks",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
];

fn is_skipped(target: &str) -> bool {
    SKIPPED_TARGETS.iter().any(|skip| {
        target == *skip
            || target
                .strip_prefix(skip)
                .is_some_and(|rest| rest.starts_with("::"))
    })
}

pub fn map_level(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warn,
        Level::INFO => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

/// Collects the `message` and every other field of an event.
#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_owned()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::from(value));
    }
}

/// `tracing_subscriber` layer that forwards events as log entries.
#[derive(Debug, Clone)]
pub struct IngestLogLayer {
    tx: mpsc::UnboundedSender<LogEntry>,
    namespace: String,
    min_level: LogLevel,
    include_metadata: bool,
    resource_id: Option<String>,
}

impl IngestLogLayer {
    /// Build the layer and the receiving end of its channel.  Use
    /// [`spawn_drain`] (or drain the receiver yourself) to deliver entries.
    pub fn new(cfg: &LoggingConfig, namespace: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<LogEntry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let layer = Self {
            tx,
            namespace: namespace.into(),
            min_level: cfg.forward_min_level,
            include_metadata: cfg.forward_include_metadata,
            resource_id: cfg.forward_resource_id.clone(),
        };
        (layer, rx)
    }

    fn entry_for(&self, event: &Event<'_>) -> Option<LogEntry> {
        let meta = event.metadata();
        if is_skipped(meta.target()) {
            return None;
        }
        let level = map_level(meta.level());
        if level < self.min_level {
            return None;
        }

        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let mut entry = LogEntry::new(
            self.namespace.clone(),
            level,
            collector.message.unwrap_or_default(),
        );
        entry.timestamp = Some(Utc::now().to_rfc3339());
        entry.resource_id = self.resource_id.clone();

        if self.include_metadata {
            let mut metadata = collector.fields;
            metadata.insert("target".into(), Value::from(meta.target()));
            if let Some(module) = meta.module_path() {
                metadata.insert("module".into(), Value::from(module));
            }
            if let Some(file) = meta.file() {
                metadata.insert("file".into(), Value::from(file));
            }
            if let Some(line) = meta.line() {
                metadata.insert("line".into(), Value::from(line));
            }
            entry.metadata = Some(metadata);
        }
        Some(entry)
    }
}

impl<S: Subscriber> Layer<S> for IngestLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if let Some(entry) = self.entry_for(event) {
            // The receiver is gone once the drain task stopped; nothing to do.
            let _ = self.tx.send(entry);
        }
    }
}

/// Move entries from `rx` into `batcher` until every layer handle is
/// dropped or `cancel` fires.  On cancellation, entries already queued are
/// still moved before the task exits.
pub fn spawn_drain(
    mut rx: mpsc::UnboundedReceiver<LogEntry>,
    batcher: Arc<TelemetryBatcher<LogEntry>>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    while let Ok(entry) = rx.try_recv() {
                        batcher.enqueue(entry).await;
                    }
                    break;
                }
                next = rx.recv() => match next {
                    Some(entry) => batcher.enqueue(entry).await,
                    None => break,
                },
            }
        }
    })
}
