//! Buffered upload of finalized records.
//!
//! Records accumulate in memory and go out in one sink call when the buffer
//! reaches `batch_size`, on an optional interval, or on an explicit flush.
//! Nothing is dropped on failure: undelivered records stay buffered, ahead
//! of anything enqueued while the failed send was in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mt_client::{RecordSink, UploadSummary};
use mt_domain::error::{Error, Result};
use mt_domain::trace::TraceEvent;

/// What a single flush did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Records handed to the sink.
    pub sent: usize,
    pub inserted: u64,
    /// Records put back into the buffer.
    pub retained: usize,
}

pub struct TelemetryBatcher<T> {
    kind: &'static str,
    batch_size: usize,
    sink: Arc<dyn RecordSink<T>>,
    buffer: Mutex<Vec<T>>,
    /// Serializes flushes: at most one sink call in flight.
    flush_gate: tokio::sync::Mutex<()>,
    closed: AtomicBool,
}

impl<T> std::fmt::Debug for TelemetryBatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryBatcher")
            .field("kind", &self.kind)
            .field("batch_size", &self.batch_size)
            .field("pending", &self.buffer.lock().len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T> TelemetryBatcher<T>
where
    T: Send + Sync + 'static,
{
    /// `kind` labels trace events (`"records"`, `"logs"`).
    pub fn new(kind: &'static str, sink: Arc<dyn RecordSink<T>>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Config("batch.batch_size must be greater than 0".into()));
        }
        Ok(Self {
            kind,
            batch_size,
            sink,
            buffer: Mutex::new(Vec::new()),
            flush_gate: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Records currently buffered.
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Buffer `item`, flushing once the buffer holds `batch_size` records.
    pub async fn enqueue(&self, item: T) {
        if self.is_closed() {
            tracing::warn!(kind = self.kind, "enqueue after shutdown; record stays buffered");
        }
        let len = {
            let mut buf = self.buffer.lock();
            buf.push(item);
            buf.len()
        };
        if len >= self.batch_size {
            self.flush().await;
        }
    }

    /// Send everything buffered in one sink call.
    ///
    /// Failures are logged, never returned: the undelivered records go back
    /// to the front of the buffer.
    pub async fn flush(&self) -> FlushOutcome {
        let _gate = self.flush_gate.lock().await;

        let batch = std::mem::take(&mut *self.buffer.lock());
        if batch.is_empty() {
            return FlushOutcome::default();
        }
        let sent = batch.len();

        match self.sink.send(&batch).await {
            Ok(summary) if summary.is_complete() => {
                tracing::debug!(kind = self.kind, sent, inserted = summary.total_inserted, "batch flushed");
                TraceEvent::BatchFlushed {
                    kind: self.kind,
                    records: sent,
                    inserted: summary.total_inserted,
                    failed_chunks: 0,
                }
                .emit();
                FlushOutcome {
                    sent,
                    inserted: summary.total_inserted,
                    retained: 0,
                }
            }
            Ok(summary) => {
                let failed = retain_failed(batch, &summary);
                let retained = failed.len();
                tracing::warn!(
                    kind = self.kind,
                    sent,
                    retained,
                    failed_chunks = summary.failures.len(),
                    "batch partially flushed; failed chunks kept for the next flush"
                );
                TraceEvent::BatchFlushed {
                    kind: self.kind,
                    records: sent,
                    inserted: summary.total_inserted,
                    failed_chunks: summary.failures.len(),
                }
                .emit();
                self.requeue_front(failed);
                FlushOutcome {
                    sent,
                    inserted: summary.total_inserted,
                    retained,
                }
            }
            Err(e) => {
                tracing::warn!(kind = self.kind, sent, error = %e, "batch flush failed; records kept");
                TraceEvent::BatchFlushFailed {
                    kind: self.kind,
                    retained: sent,
                    error: e.to_string(),
                }
                .emit();
                self.requeue_front(batch);
                FlushOutcome {
                    sent,
                    inserted: 0,
                    retained: sent,
                }
            }
        }
    }

    /// Terminal flush.  Call on every exit path; dropping a batcher does not
    /// flush it.
    pub async fn shutdown(&self) -> FlushOutcome {
        self.closed.store(true, Ordering::SeqCst);
        let outcome = self.flush().await;
        if outcome.retained > 0 {
            tracing::warn!(
                kind = self.kind,
                retained = outcome.retained,
                "shutdown left undelivered records"
            );
        }
        outcome
    }

    /// Put `older` back ahead of whatever was enqueued meanwhile.
    fn requeue_front(&self, mut older: Vec<T>) {
        let mut buf = self.buffer.lock();
        older.append(&mut buf);
        *buf = older;
    }
}

/// Periodically flush `batcher` until `cancel` fires.
pub fn spawn_interval_flush<T>(
    batcher: Arc<TelemetryBatcher<T>>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    batcher.flush().await;
                }
            }
        }
    })
}

/// Keep exactly the items of the chunks listed as failed, in order.
fn retain_failed<T>(batch: Vec<T>, summary: &UploadSummary) -> Vec<T> {
    batch
        .into_iter()
        .enumerate()
        .filter(|(i, _)| summary.failures.iter().any(|f| f.range().contains(i)))
        .map(|(_, item)| item)
        .collect()
}
