//! Session managers handed to framework adapters.
//!
//! [`SessionManager`] decides everything in-process.  [`PersistentSessionManager`]
//! answers from the local store when it can and otherwise defers to the
//! server-side authority, degrading to the in-process decision when the
//! server cannot be reached.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mt_domain::config::{SessionsConfig, ANONYMOUS_USER};
use mt_domain::error::{Error, Result};
use mt_domain::trace::TraceEvent;

use crate::resolver::{RemoteSessionResolver, SessionLookup};
use crate::store::{SessionInfo, SessionStore};

/// What an adapter needs from a session manager.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Return the session id for `user_id`, reusing the active session when
    /// there is one.  Never fails: degraded paths still yield a valid id.
    async fn resolve_or_create(&self, user_id: &str, namespace: &str, force_new: bool) -> String;

    fn info(&self, user_id: &str) -> Option<SessionInfo>;
}

/// Blank identities collapse onto the anonymous user.
fn effective_user(user_id: &str) -> &str {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        ANONYMOUS_USER
    } else {
        trimmed
    }
}

fn checked_timeout(secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(Error::Config(
            "sessions.inactivity_timeout_secs must be greater than 0".into(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// In-process session manager.  Construct once and share by `Arc` across
/// every concurrently running agent invocation.
#[derive(Debug, Clone)]
pub struct SessionManager {
    store: Arc<SessionStore>,
}

impl SessionManager {
    pub fn new(inactivity_timeout: Duration) -> Self {
        Self::with_store(Arc::new(SessionStore::new(inactivity_timeout)))
    }

    pub fn with_store(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    pub fn from_config(cfg: &SessionsConfig) -> Result<Self> {
        checked_timeout(cfg.inactivity_timeout_secs)?;
        Ok(Self::with_store(Arc::new(SessionStore::from_config(cfg))))
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn resolve_or_create(&self, user_id: &str, namespace: &str, force_new: bool) -> String {
        self.store
            .resolve_or_create(effective_user(user_id), namespace, force_new)
    }

    pub fn update_activity(&self, user_id: &str) {
        self.store.update_activity(effective_user(user_id));
    }

    pub fn evict(&self, user_id: &str) -> bool {
        self.store.evict(effective_user(user_id))
    }

    pub fn sweep_expired(&self) -> usize {
        self.store.sweep_expired()
    }

    pub fn info(&self, user_id: &str) -> Option<SessionInfo> {
        self.store.info(effective_user(user_id))
    }
}

#[async_trait]
impl SessionSource for SessionManager {
    async fn resolve_or_create(&self, user_id: &str, namespace: &str, force_new: bool) -> String {
        SessionManager::resolve_or_create(self, user_id, namespace, force_new)
    }

    fn info(&self, user_id: &str) -> Option<SessionInfo> {
        SessionManager::info(self, user_id)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Two-tier manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session manager for stateless deployments (serverless, multiple
/// workers): the local store is a cache in front of the server-side
/// authority.
#[derive(Clone)]
pub struct PersistentSessionManager {
    store: Arc<SessionStore>,
    resolver: Arc<dyn RemoteSessionResolver>,
}

impl std::fmt::Debug for PersistentSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentSessionManager")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl PersistentSessionManager {
    pub fn new(resolver: Arc<dyn RemoteSessionResolver>, inactivity_timeout: Duration) -> Self {
        Self::with_store(resolver, Arc::new(SessionStore::new(inactivity_timeout)))
    }

    pub fn with_store(resolver: Arc<dyn RemoteSessionResolver>, store: Arc<SessionStore>) -> Self {
        Self { store, resolver }
    }

    pub fn from_config(
        resolver: Arc<dyn RemoteSessionResolver>,
        cfg: &SessionsConfig,
    ) -> Result<Self> {
        checked_timeout(cfg.inactivity_timeout_secs)?;
        Ok(Self::with_store(
            resolver,
            Arc::new(SessionStore::from_config(cfg)),
        ))
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Local cache first, then the server, then the local algorithm.
    ///
    /// The store lock is released before the remote call is awaited.
    pub async fn resolve_or_create(&self, user_id: &str, namespace: &str, force_new: bool) -> String {
        let user_id = effective_user(user_id);

        if !force_new {
            if let Some(session_id) = self.store.try_reuse(user_id, namespace) {
                return session_id;
            }
        }

        let timeout = self.store.inactivity_timeout();
        let lookup = SessionLookup {
            namespace: namespace.to_owned(),
            user_id: user_id.to_owned(),
            // Round up so sub-second timeouts do not become "never reuse".
            inactivity_timeout: timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0),
            force_new,
        };

        let failure = match self.resolver.get_or_create_session(&lookup).await {
            Ok(resolved) if !resolved.session_id.trim().is_empty() => {
                self.store.install(user_id, namespace, &resolved.session_id);
                tracing::debug!(
                    user_id,
                    session_id = %resolved.session_id,
                    reused = resolved.reused,
                    "session resolved by server"
                );
                TraceEvent::SessionResolved {
                    namespace: namespace.to_owned(),
                    user_id: user_id.to_owned(),
                    session_id: resolved.session_id.clone(),
                    is_new: !resolved.reused,
                    source: "remote",
                }
                .emit();
                return resolved.session_id;
            }
            Ok(_) => "server returned an empty session_id".to_owned(),
            Err(e) => e.to_string(),
        };

        tracing::warn!(
            user_id,
            namespace,
            error = %failure,
            "server session lookup failed, using local fallback"
        );
        TraceEvent::SessionFallback {
            user_id: user_id.to_owned(),
            reason: failure,
        }
        .emit();
        self.store.resolve_or_create(user_id, namespace, force_new)
    }

    pub fn update_activity(&self, user_id: &str) {
        self.store.update_activity(effective_user(user_id));
    }

    pub fn evict(&self, user_id: &str) -> bool {
        self.store.evict(effective_user(user_id))
    }

    pub fn sweep_expired(&self) -> usize {
        self.store.sweep_expired()
    }

    pub fn info(&self, user_id: &str) -> Option<SessionInfo> {
        self.store.info(effective_user(user_id))
    }
}

#[async_trait]
impl SessionSource for PersistentSessionManager {
    async fn resolve_or_create(&self, user_id: &str, namespace: &str, force_new: bool) -> String {
        PersistentSessionManager::resolve_or_create(self, user_id, namespace, force_new).await
    }

    fn info(&self, user_id: &str) -> Option<SessionInfo> {
        PersistentSessionManager::info(self, user_id)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Background sweep
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Periodically drop expired entries so identities that never come back do
/// not accumulate.  Stops when `cancel` fires.
pub fn spawn_sweeper(
    store: Arc<SessionStore>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = store.sweep_expired();
                    tracing::debug!(removed, remaining = store.len(), "session sweep");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_identity_is_anonymous() {
        let mgr = SessionManager::new(Duration::from_secs(120));
        let sid = mgr.resolve_or_create("  ", "ns", false);
        assert!(sid.starts_with("ns-anonymous-"));
        assert!(mgr.info("").is_some());
    }

    #[test]
    fn zero_timeout_is_a_config_error() {
        let cfg = SessionsConfig {
            inactivity_timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(
            SessionManager::from_config(&cfg),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn sweeper_runs_until_cancelled() {
        use crate::clock::ManualClock;

        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let store = Arc::new(SessionStore::with_clock(Duration::from_secs(1), clock.clone()));
        store.resolve_or_create("u1", "ns", false);
        clock.advance(Duration::from_secs(2));

        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(store.clone(), Duration::from_millis(10), cancel.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        cancel.cancel();
        handle.await.unwrap();
        assert!(store.is_empty());
    }
}
