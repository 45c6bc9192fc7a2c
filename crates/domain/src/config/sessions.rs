use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session continuity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Identity used when the host supplies none.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Namespace that sessions and records are partitioned under.
    #[serde(default = "d_namespace")]
    pub namespace: String,

    /// Seconds of inactivity after which the next activity mints a new
    /// session.
    #[serde(default = "d_120")]
    pub inactivity_timeout_secs: u64,

    /// Consult the server-side session authority when the local cache
    /// cannot answer.  Required for serverless / multi-worker deployments.
    #[serde(default)]
    pub persistent: bool,

    /// What to do when two sessions for the same identity are created within
    /// the same second.
    #[serde(default)]
    pub same_second_ids: SameSecondIds,

    /// Interval for the background sweep of expired entries.  `0` disables it.
    #[serde(default = "d_300")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            namespace: d_namespace(),
            inactivity_timeout_secs: 120,
            persistent: false,
            same_second_ids: SameSecondIds::default(),
            sweep_interval_secs: 300,
        }
    }
}

/// Session ids carry a whole-second timestamp, so two creations in the same
/// second would collide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameSecondIds {
    /// Append `-2`, `-3`, ... to the id replacing a same-second predecessor.
    #[default]
    Suffix,
    /// Keep the bare id; the two sessions are indistinguishable by id.
    Allow,
}

/// Reject namespaces the API cannot partition on.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.trim().is_empty() {
        return Err(Error::Config("namespace must not be empty".into()));
    }
    if namespace.len() > 128 {
        return Err(Error::Config(format!(
            "namespace is {} bytes long (max 128)",
            namespace.len()
        )));
    }
    if namespace
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(Error::Config(format!(
            "namespace {namespace:?} must not contain whitespace"
        )));
    }
    Ok(())
}

// ── serde default helpers ───────────────────────────────────────────

fn d_namespace() -> String {
    "default".into()
}
fn d_120() -> u64 {
    120
}
fn d_300() -> u64 {
    300
}
