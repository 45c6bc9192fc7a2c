//! One-call wiring of the SDK from a [`Config`].
//!
//! [`Telemetry::start`] validates the config, builds the ingestion client,
//! the session source and the batchers, and spawns the background tasks
//! (session sweep, interval flushes, log drain).  [`Telemetry::shutdown`]
//! stops them and flushes whatever is still buffered.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mt_client::{RecordSink, RestIngestClient};
use mt_domain::config::{Config, ConfigSeverity};
use mt_domain::error::{Error, Result};
use mt_domain::records::{ConversationRecord, LogEntry};
use mt_sessions::{
    spawn_sweeper, PersistentSessionManager, SessionManager, SessionSource, SessionStore,
};

use crate::batcher::{spawn_interval_flush, FlushOutcome, TelemetryBatcher};
use crate::log_layer::spawn_drain;
use crate::tracker::{RunTracker, TrackerOptions};

/// What was delivered during [`Telemetry::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub records: FlushOutcome,
    pub logs: Option<FlushOutcome>,
}

/// Fully wired SDK runtime.
pub struct Telemetry {
    config: Config,
    client: Arc<RestIngestClient>,
    sessions: Arc<dyn SessionSource>,
    store: Arc<SessionStore>,
    records: Arc<TelemetryBatcher<ConversationRecord>>,
    logs: Option<Arc<TelemetryBatcher<LogEntry>>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("namespace", &self.config.sessions.namespace)
            .field("client", &self.client)
            .field("pending_records", &self.records.pending())
            .field("forwarding_logs", &self.logs.is_some())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

/// Log every issue and fail on the first error-level one.
fn check_config(config: &Config) -> Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        return Err(Error::Config(format!(
            "config validation failed with {errors} error(s)"
        )));
    }
    Ok(())
}

impl Telemetry {
    /// Wire everything up.  Must be called inside a tokio runtime.
    ///
    /// `log_rx` is the receiving end returned by `IngestLogLayer::new`; pass
    /// it to forward application logs.  The layer itself is installed by the
    /// caller together with the rest of its subscriber.
    pub async fn start(
        config: Config,
        log_rx: Option<mpsc::UnboundedReceiver<LogEntry>>,
    ) -> Result<Self> {
        check_config(&config)?;

        // ── Ingestion client ─────────────────────────────────────────
        let client = Arc::new(RestIngestClient::new(&config.client)?);
        tracing::info!(
            base_url = %client.base_url(),
            namespace = %config.sessions.namespace,
            "ingestion client ready"
        );

        // ── Sessions ─────────────────────────────────────────────────
        let (sessions, store): (Arc<dyn SessionSource>, Arc<SessionStore>) =
            if config.sessions.persistent {
                let mgr = PersistentSessionManager::from_config(client.clone(), &config.sessions)?;
                let store = mgr.store().clone();
                (Arc::new(mgr), store)
            } else {
                let mgr = SessionManager::from_config(&config.sessions)?;
                let store = mgr.store().clone();
                (Arc::new(mgr), store)
            };
        tracing::info!(
            persistent = config.sessions.persistent,
            inactivity_timeout_secs = config.sessions.inactivity_timeout_secs,
            "session manager ready"
        );

        // ── Batchers ─────────────────────────────────────────────────
        let record_sink: Arc<dyn RecordSink<ConversationRecord>> = client.clone();
        let records = Arc::new(TelemetryBatcher::new(
            "records",
            record_sink,
            config.batch.batch_size,
        )?);

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        let logs = match log_rx {
            Some(rx) => {
                let log_sink: Arc<dyn RecordSink<LogEntry>> = client.clone();
                let batcher = Arc::new(TelemetryBatcher::new(
                    "logs",
                    log_sink,
                    config.batch.batch_size,
                )?);
                tasks.push(spawn_drain(rx, batcher.clone(), cancel.clone()));
                tracing::info!(
                    min_level = %config.logging.forward_min_level,
                    "log forwarding enabled"
                );
                Some(batcher)
            }
            None => None,
        };

        // ── Background tasks ─────────────────────────────────────────
        if config.sessions.sweep_interval_secs > 0 {
            tasks.push(spawn_sweeper(
                store.clone(),
                Duration::from_secs(config.sessions.sweep_interval_secs),
                cancel.clone(),
            ));
        }
        if config.batch.flush_interval_secs > 0 {
            let every = Duration::from_secs(config.batch.flush_interval_secs);
            tasks.push(spawn_interval_flush(records.clone(), every, cancel.clone()));
            if let Some(logs) = &logs {
                tasks.push(spawn_interval_flush(logs.clone(), every, cancel.clone()));
            }
        }

        Ok(Self {
            config,
            client,
            sessions,
            store,
            records,
            logs,
            cancel,
            tasks,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &Arc<RestIngestClient> {
        &self.client
    }

    pub fn sessions(&self) -> Arc<dyn SessionSource> {
        self.sessions.clone()
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn records(&self) -> &Arc<TelemetryBatcher<ConversationRecord>> {
        &self.records
    }

    pub fn logs(&self) -> Option<&Arc<TelemetryBatcher<LogEntry>>> {
        self.logs.as_ref()
    }

    /// A tracker for one run, sharing this runtime's sessions and batcher.
    pub fn tracker(&self) -> Result<RunTracker> {
        RunTracker::new(
            TrackerOptions::new(self.config.sessions.namespace.clone()),
            self.sessions.clone(),
            self.records.clone(),
        )
    }

    /// Stop the background tasks, then flush and close both batchers.
    pub async fn shutdown(self) -> ShutdownReport {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }

        let records = self.records.shutdown().await;
        let logs = match &self.logs {
            Some(logs) => Some(logs.shutdown().await),
            None => None,
        };
        tracing::info!(
            records_sent = records.sent,
            records_retained = records.retained,
            "telemetry shut down"
        );
        ShutdownReport { records, logs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_layer::IngestLogLayer;
    use mt_domain::config::{BatchConfig, ClientConfig};
    use tracing_subscriber::layer::SubscriberExt;

    #[tokio::test]
    async fn missing_token_fails_validation() {
        let mut config = Config::default();
        config.client.token_env = "MT_TEST_TOKEN_THAT_IS_NEVER_SET".into();
        let err = Telemetry::start(config, None).await.unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("1 error")));
    }

    #[tokio::test]
    async fn persistent_mode_wires_up() {
        let config = Config {
            client: ClientConfig::with_token("tk_test"),
            sessions: mt_domain::config::SessionsConfig {
                persistent: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let telemetry = Telemetry::start(config, None).await.unwrap();
        assert!(telemetry.logs().is_none());
        assert_eq!(telemetry.tracker().unwrap().namespace(), "default");

        let report = telemetry.shutdown().await;
        assert_eq!(report.records, FlushOutcome::default());
        assert!(report.logs.is_none());
    }

    #[tokio::test]
    async fn forwarded_logs_are_drained_before_shutdown_flush() {
        const N: usize = 12;
        let config = Config {
            client: ClientConfig {
                base_url: "http://127.0.0.1:1".into(),
                max_retries: 0,
                timeout_ms: 1_000,
                ..ClientConfig::with_token("tk_test")
            },
            batch: BatchConfig {
                batch_size: 100,
                flush_interval_secs: 0,
            },
            ..Default::default()
        };
        let (layer, rx) = IngestLogLayer::new(&config.logging, "support");
        let telemetry = Telemetry::start(config, Some(rx)).await.unwrap();

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            for i in 0..N {
                tracing::warn!(target: "app", "event {i}");
            }
        });

        // Nothing listens on port 1, so the entries stay buffered and the
        // report shows exactly what the drain task handed to the batcher.
        let report = telemetry.shutdown().await;
        let logs = report.logs.unwrap();
        assert_eq!(logs.sent, N);
        assert_eq!(logs.retained, N);
        assert_eq!(report.records, FlushOutcome::default());
    }
}
