//! Session timeout lifecycle.
//!
//! Expiry is never stored.  Whether a session is still alive is computed on
//! demand from its last activity and the configured inactivity timeout, at
//! the moment the next activity arrives.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Reason a new session was minted instead of reusing the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetReason {
    /// No session existed for the identity.
    FirstActivity,
    /// The caller asked for a fresh session.
    Forced,
    IdleTimeout { idle_secs: u64 },
    /// The identity's current session belongs to another namespace.
    NamespaceChanged,
}

impl std::fmt::Display for ResetReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstActivity => write!(f, "first activity"),
            Self::Forced => write!(f, "forced"),
            Self::IdleTimeout { idle_secs } => write!(f, "idle timeout ({idle_secs}s)"),
            Self::NamespaceChanged => write!(f, "namespace changed"),
        }
    }
}

/// Outcome of a resolve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Reused,
    Created(ResetReason),
}

impl Resolution {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Liveness of a session at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Active { idle: Duration },
    Expired { idle: Duration },
}

/// Evaluates the inactivity timeout.
#[derive(Debug, Clone, Copy)]
pub struct SessionLifecycle {
    timeout: Duration,
}

impl SessionLifecycle {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A session is active while `now - last_activity < timeout`.
    pub fn liveness(&self, last_activity: DateTime<Utc>, now: DateTime<Utc>) -> Liveness {
        let idle = elapsed(last_activity, now);
        if idle < self.timeout {
            Liveness::Active { idle }
        } else {
            Liveness::Expired { idle }
        }
    }

    pub fn is_expired(&self, last_activity: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        matches!(self.liveness(last_activity, now), Liveness::Expired { .. })
    }
}

/// Time from `since` to `now`, clamped at zero when the clock went backwards.
pub fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(since)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap() + chrono::Duration::seconds(secs as i64)
    }

    #[test]
    fn active_inside_window() {
        let lc = SessionLifecycle::new(Duration::from_secs(120));
        assert_eq!(
            lc.liveness(at(0), at(119)),
            Liveness::Active {
                idle: Duration::from_secs(119)
            }
        );
    }

    #[test]
    fn expired_at_exact_boundary() {
        let lc = SessionLifecycle::new(Duration::from_secs(120));
        assert!(lc.is_expired(at(0), at(120)));
        assert!(lc.is_expired(at(0), at(500)));
    }

    #[test]
    fn clock_regression_counts_as_no_idle_time() {
        let lc = SessionLifecycle::new(Duration::from_secs(1));
        assert_eq!(
            lc.liveness(at(10), at(5)),
            Liveness::Active {
                idle: Duration::ZERO
            }
        );
    }

    #[test]
    fn reset_reason_display() {
        assert_eq!(
            ResetReason::IdleTimeout { idle_secs: 130 }.to_string(),
            "idle timeout (130s)"
        );
        assert!(Resolution::Created(ResetReason::Forced).is_new());
        assert!(!Resolution::Reused.is_new());
    }
}
