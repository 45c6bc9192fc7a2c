//! In-process session store.
//!
//! Maps a user identity to its current session.  Every read-check-write runs
//! under a single write lock over the whole map, so concurrent resolution for
//! the same identity never produces two live sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use mt_domain::config::{SameSecondIds, SessionsConfig};
use mt_domain::trace::TraceEvent;

use crate::clock::{Clock, SystemClock};
use crate::lifecycle::{elapsed, Liveness, ResetReason, Resolution, SessionLifecycle};
use crate::session_id::mint_session_id;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session entry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The current session of one user identity.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub user_id: String,
    pub namespace: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    /// Same-second sequence number the id was minted with (1 = no suffix).
    pub seq: u32,
}

impl SessionEntry {
    /// Bump the activity clock without ever moving it backwards.
    fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity_at {
            self.last_activity_at = now;
        }
    }
}

/// Read-only view returned by [`SessionStore::info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub namespace: String,
    /// Time since the session was created.
    pub age: Duration,
    /// Time since the last activity.
    pub idle_for: Duration,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionStore {
    lifecycle: SessionLifecycle,
    same_second: SameSecondIds,
    clock: Arc<dyn Clock>,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    /// Last id minted per `(identity, namespace)`.  Outlives the entry itself
    /// so a superseded or evicted session's id is never handed out again.
    last_minted: Mutex<HashMap<(String, String), MintMark>>,
}

/// Creation second and sequence number of a minted id.
#[derive(Debug, Clone, Copy)]
struct MintMark {
    second: i64,
    seq: u32,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("timeout", &self.lifecycle.timeout())
            .field("same_second", &self.same_second)
            .field("sessions", &self.sessions.read().len())
            .finish()
    }
}

impl SessionStore {
    pub fn new(inactivity_timeout: Duration) -> Self {
        Self::with_clock(inactivity_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(inactivity_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            lifecycle: SessionLifecycle::new(inactivity_timeout),
            same_second: SameSecondIds::default(),
            clock,
            sessions: RwLock::new(HashMap::new()),
            last_minted: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(cfg: &SessionsConfig) -> Self {
        Self::new(Duration::from_secs(cfg.inactivity_timeout_secs))
            .same_second_ids(cfg.same_second_ids)
    }

    pub fn same_second_ids(mut self, policy: SameSecondIds) -> Self {
        self.same_second = policy;
        self
    }

    pub fn inactivity_timeout(&self) -> Duration {
        self.lifecycle.timeout()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Return the identity's current session id, or mint a new one.
    pub fn resolve_or_create(&self, user_id: &str, namespace: &str, force_new: bool) -> String {
        self.resolve(user_id, namespace, force_new).0
    }

    /// Like [`resolve_or_create`](Self::resolve_or_create), also reporting
    /// whether the session was reused or why a new one was minted.
    pub fn resolve(
        &self,
        user_id: &str,
        namespace: &str,
        force_new: bool,
    ) -> (String, Resolution) {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();

        let reason = match sessions.get_mut(user_id) {
            _ if force_new => ResetReason::Forced,
            None => ResetReason::FirstActivity,
            Some(entry) if entry.namespace != namespace => ResetReason::NamespaceChanged,
            Some(entry) => match self.lifecycle.liveness(entry.last_activity_at, now) {
                Liveness::Active { .. } => {
                    entry.touch(now);
                    return (entry.session_id.clone(), Resolution::Reused);
                }
                Liveness::Expired { idle } => {
                    TraceEvent::SessionExpired {
                        user_id: user_id.to_owned(),
                        session_id: entry.session_id.clone(),
                        idle_secs: idle.as_secs() as i64,
                    }
                    .emit();
                    ResetReason::IdleTimeout {
                        idle_secs: idle.as_secs(),
                    }
                }
            },
        };

        let seq = self.next_seq(sessions.get(user_id), user_id, namespace, now);
        let session_id = mint_session_id(namespace, user_id, now, seq);
        sessions.insert(
            user_id.to_owned(),
            SessionEntry {
                user_id: user_id.to_owned(),
                namespace: namespace.to_owned(),
                session_id: session_id.clone(),
                created_at: now,
                last_activity_at: now,
                seq,
            },
        );
        drop(sessions);

        tracing::debug!(user_id, namespace, %session_id, %reason, "session created");
        TraceEvent::SessionResolved {
            namespace: namespace.to_owned(),
            user_id: user_id.to_owned(),
            session_id: session_id.clone(),
            is_new: true,
            source: "local",
        }
        .emit();

        (session_id, Resolution::Created(reason))
    }

    /// Fast path only: reuse the identity's session if it is still active,
    /// without ever creating one.
    pub fn try_reuse(&self, user_id: &str, namespace: &str) -> Option<String> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();
        let entry = sessions.get_mut(user_id)?;
        if entry.namespace != namespace || self.lifecycle.is_expired(entry.last_activity_at, now) {
            return None;
        }
        entry.touch(now);
        Some(entry.session_id.clone())
    }

    /// Overwrite the identity's entry with a session decided elsewhere (the
    /// server-side authority).  Keeps `created_at` when the id is unchanged.
    pub fn install(&self, user_id: &str, namespace: &str, session_id: &str) {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();
        let created_at = sessions
            .get(user_id)
            .filter(|e| e.session_id == session_id)
            .map(|e| e.created_at)
            .unwrap_or(now);
        sessions.insert(
            user_id.to_owned(),
            SessionEntry {
                user_id: user_id.to_owned(),
                namespace: namespace.to_owned(),
                session_id: session_id.to_owned(),
                created_at,
                last_activity_at: now,
                seq: 1,
            },
        );
    }

    /// Bump the activity clock of an existing entry.  No-op if absent.
    pub fn update_activity(&self, user_id: &str) {
        let now = self.clock.now();
        if let Some(entry) = self.sessions.write().get_mut(user_id) {
            entry.touch(now);
        }
    }

    /// Drop the identity's entry.  Returns whether one existed.
    pub fn evict(&self, user_id: &str) -> bool {
        self.sessions.write().remove(user_id).is_some()
    }

    /// Remove every expired entry and return how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, e| !self.lifecycle.is_expired(e.last_activity_at, now));
        let removed = before - sessions.len();
        let remaining = sessions.len();
        drop(sessions);
        // Marks from earlier seconds can no longer collide with a new id.
        self.last_minted
            .lock()
            .retain(|_, mark| mark.second >= now.timestamp());

        if removed > 0 {
            TraceEvent::SessionsSwept { removed, remaining }.emit();
        }
        removed
    }

    /// Introspect the identity's current entry.
    pub fn info(&self, user_id: &str) -> Option<SessionInfo> {
        let now = self.clock.now();
        let sessions = self.sessions.read();
        let entry = sessions.get(user_id)?;
        Some(SessionInfo {
            session_id: entry.session_id.clone(),
            namespace: entry.namespace.clone(),
            age: elapsed(entry.created_at, now),
            idle_for: elapsed(entry.last_activity_at, now),
        })
    }

    /// Snapshot of the raw entry.
    pub fn get(&self, user_id: &str) -> Option<SessionEntry> {
        self.sessions.read().get(user_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Sequence number for a session minted now.
    ///
    /// Under the `suffix` policy the number continues from whichever id
    /// minted in this same second is newest: the entry being replaced, or an
    /// earlier id for the same identity and namespace that was since
    /// superseded or evicted.
    fn next_seq(
        &self,
        prior: Option<&SessionEntry>,
        user_id: &str,
        namespace: &str,
        now: DateTime<Utc>,
    ) -> u32 {
        if self.same_second == SameSecondIds::Allow {
            return 1;
        }
        let second = now.timestamp();
        let from_prior = prior
            .filter(|p| p.namespace == namespace && p.created_at.timestamp() == second)
            .map(|p| p.seq);

        let mut marks = self.last_minted.lock();
        let key = (user_id.to_owned(), namespace.to_owned());
        let from_mark = marks
            .get(&key)
            .filter(|m| m.second == second)
            .map(|m| m.seq);

        let seq = from_prior.max(from_mark).map_or(1, |s| s + 1);
        marks.insert(key, MintMark { second, seq });
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::session_id::creation_timestamp;
    use chrono::TimeZone;

    fn store(timeout_secs: u64) -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ));
        let store = SessionStore::with_clock(Duration::from_secs(timeout_secs), clock.clone());
        (store, clock)
    }

    #[test]
    fn reuse_within_window() {
        let (store, clock) = store(120);
        let first = store.resolve_or_create("alice", "ns", false);
        clock.advance(Duration::from_secs(119));
        let (second, resolution) = store.resolve("alice", "ns", false);
        assert_eq!(first, second);
        assert_eq!(resolution, Resolution::Reused);
    }

    #[test]
    fn reuse_resets_idle_clock() {
        let (store, clock) = store(120);
        let first = store.resolve_or_create("alice", "ns", false);
        // Three activities 100s apart: never idle for 120s in a row.
        for _ in 0..3 {
            clock.advance(Duration::from_secs(100));
            assert_eq!(store.resolve_or_create("alice", "ns", false), first);
        }
    }

    #[test]
    fn expiry_after_window_mints_later_id() {
        let (store, clock) = store(1);
        let sid1 = store.resolve_or_create("u1", "ns", false);
        clock.advance(Duration::from_secs(2));
        let (sid2, resolution) = store.resolve("u1", "ns", false);

        assert_ne!(sid1, sid2);
        assert!(sid1.starts_with("ns-u1-"));
        assert!(sid2.starts_with("ns-u1-"));
        assert_eq!(
            resolution,
            Resolution::Created(ResetReason::IdleTimeout { idle_secs: 2 })
        );
        let t1 = creation_timestamp(&sid1, "ns", "u1").unwrap();
        let t2 = creation_timestamp(&sid2, "ns", "u1").unwrap();
        assert!(t2 > t1);
    }

    #[test]
    fn expiry_at_exact_timeout() {
        let (store, clock) = store(60);
        let first = store.resolve_or_create("u1", "ns", false);
        clock.advance(Duration::from_secs(60));
        assert_ne!(store.resolve_or_create("u1", "ns", false), first);
    }

    #[test]
    fn identities_are_isolated() {
        let (store, _) = store(120);
        let alice = store.resolve_or_create("alice", "ns", false);
        let bob = store.resolve_or_create("bob", "ns", false);
        assert_ne!(alice, bob);
        assert!(alice.contains("alice"));
        assert!(bob.contains("bob"));
    }

    #[test]
    fn force_new_within_same_second_gets_suffix() {
        let (store, _) = store(120);
        let first = store.resolve_or_create("u1", "ns", false);
        let (second, resolution) = store.resolve("u1", "ns", true);
        let third = store.resolve_or_create("u1", "ns", true);

        assert_eq!(resolution, Resolution::Created(ResetReason::Forced));
        assert_ne!(first, second);
        assert_eq!(second, format!("{first}-2"));
        assert_eq!(third, format!("{first}-3"));
    }

    #[test]
    fn force_new_with_allow_policy_keeps_bare_id() {
        let (store, _) = store(120);
        let store = store.same_second_ids(SameSecondIds::Allow);
        let first = store.resolve_or_create("u1", "ns", false);
        let second = store.resolve_or_create("u1", "ns", true);
        assert_eq!(first, second);
    }

    #[test]
    fn force_new_in_a_later_second_has_no_suffix() {
        let (store, clock) = store(120);
        let first = store.resolve_or_create("u1", "ns", false);
        clock.advance(Duration::from_secs(1));
        let second = store.resolve_or_create("u1", "ns", true);
        assert_ne!(first, second);
        assert!(!second.ends_with("-2"));
    }

    #[test]
    fn namespace_change_mints_new_session() {
        let (store, _) = store(120);
        let a = store.resolve_or_create("u1", "sales", false);
        let (b, resolution) = store.resolve("u1", "support", false);
        assert_ne!(a, b);
        assert!(b.starts_with("support-u1-"));
        assert_eq!(resolution, Resolution::Created(ResetReason::NamespaceChanged));
    }

    #[test]
    fn clock_regression_does_not_rewind_activity() {
        let (store, clock) = store(120);
        let start = store.now();
        let first = store.resolve_or_create("u1", "ns", false);
        clock.advance(Duration::from_secs(50));
        store.update_activity("u1");
        clock.set(start);
        assert_eq!(store.resolve_or_create("u1", "ns", false), first);
        assert_eq!(
            store.get("u1").unwrap().last_activity_at,
            start + chrono::Duration::seconds(50)
        );
    }

    #[test]
    fn update_activity_extends_window_and_ignores_unknown() {
        let (store, clock) = store(60);
        let first = store.resolve_or_create("u1", "ns", false);
        clock.advance(Duration::from_secs(50));
        store.update_activity("u1");
        store.update_activity("nobody");
        clock.advance(Duration::from_secs(50));
        assert_eq!(store.resolve_or_create("u1", "ns", false), first);
        assert!(store.get("nobody").is_none());
    }

    #[test]
    fn evict_forces_new_session() {
        let (store, clock) = store(120);
        let first = store.resolve_or_create("u1", "ns", false);
        assert!(store.evict("u1"));
        assert!(!store.evict("u1"));
        clock.advance(Duration::from_secs(1));
        assert_ne!(store.resolve_or_create("u1", "ns", false), first);
    }

    #[test]
    fn namespace_round_trip_within_one_second_mints_fresh_id() {
        let (store, _clock) = store(120);
        let first = store.resolve_or_create("u1", "sales", false);
        let other = store.resolve_or_create("u1", "support", false);
        let back = store.resolve_or_create("u1", "sales", false);

        assert_eq!(first, "sales-u1-20260115-100000");
        assert_eq!(other, "support-u1-20260115-100000");
        assert_ne!(back, first);
        assert_eq!(back, format!("{first}-2"));
    }

    #[test]
    fn evict_then_recreate_within_one_second_mints_fresh_id() {
        let (store, _clock) = store(120);
        let first = store.resolve_or_create("u1", "ns", false);
        assert!(store.evict("u1"));

        let again = store.resolve_or_create("u1", "ns", false);
        assert_ne!(again, first);
        assert_eq!(again, format!("{first}-2"));
    }

    #[test]
    fn sweep_forgets_marks_from_past_seconds() {
        let (store, clock) = store(60);
        let first = store.resolve_or_create("u1", "ns", false);
        assert!(store.evict("u1"));
        assert_eq!(store.last_minted.lock().len(), 1);

        clock.advance(Duration::from_secs(1));
        store.sweep_expired();
        assert!(store.last_minted.lock().is_empty());

        let later = store.resolve_or_create("u1", "ns", false);
        assert_eq!(later, "ns-u1-20260115-100001");
        assert_ne!(later, first);
    }

    #[test]
    fn sweep_removes_only_expired() {
        let (store, clock) = store(60);
        store.resolve_or_create("old", "ns", false);
        clock.advance(Duration::from_secs(30));
        store.resolve_or_create("fresh", "ns", false);
        clock.advance(Duration::from_secs(30));

        assert_eq!(store.sweep_expired(), 1);
        assert!(store.info("old").is_none());
        assert!(store.info("fresh").is_some());
        assert_eq!(store.sweep_expired(), 0);
    }

    #[test]
    fn info_reports_age_and_idle() {
        let (store, clock) = store(120);
        assert!(store.info("u1").is_none());
        let sid = store.resolve_or_create("u1", "ns", false);
        clock.advance(Duration::from_secs(40));
        store.resolve_or_create("u1", "ns", false);
        clock.advance(Duration::from_secs(15));

        let info = store.info("u1").unwrap();
        assert_eq!(info.session_id, sid);
        assert_eq!(info.age, Duration::from_secs(55));
        assert_eq!(info.idle_for, Duration::from_secs(15));
    }

    #[test]
    fn try_reuse_never_creates() {
        let (store, clock) = store(10);
        assert!(store.try_reuse("u1", "ns").is_none());
        assert!(store.is_empty());

        let sid = store.resolve_or_create("u1", "ns", false);
        assert_eq!(store.try_reuse("u1", "ns").as_deref(), Some(sid.as_str()));
        assert!(store.try_reuse("u1", "other").is_none());

        clock.advance(Duration::from_secs(10));
        assert!(store.try_reuse("u1", "ns").is_none());
    }

    #[test]
    fn install_keeps_created_at_for_same_id() {
        let (store, clock) = store(120);
        store.install("u1", "ns", "srv-1");
        let created = store.get("u1").unwrap().created_at;
        clock.advance(Duration::from_secs(5));
        store.install("u1", "ns", "srv-1");
        assert_eq!(store.get("u1").unwrap().created_at, created);
        store.install("u1", "ns", "srv-2");
        assert_eq!(
            store.get("u1").unwrap().created_at,
            created + chrono::Duration::seconds(5)
        );
    }

    #[test]
    fn concurrent_resolution_agrees_on_one_session() {
        let store = Arc::new(SessionStore::new(Duration::from_secs(120)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| store.resolve_or_create("shared", "ns", false))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.len(), 1);
    }
}
