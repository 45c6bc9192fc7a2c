//! Server-side session authority.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mt_domain::error::Result;

/// POST /sessions/get-or-create: request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLookup {
    pub namespace: String,
    pub user_id: String,
    /// Whole seconds.
    pub inactivity_timeout: u64,
    pub force_new: bool,
}

/// POST /sessions/get-or-create: response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSession {
    pub session_id: String,
    #[serde(default)]
    pub reused: bool,
    /// Whatever else the server sends back (timestamps, counters).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Performs the reuse-or-create decision against durable state shared by
/// every process talking to the same backend.
///
/// Implementations may talk to the real ingestion API or be a test double.
#[async_trait]
pub trait RemoteSessionResolver: Send + Sync {
    async fn get_or_create_session(&self, lookup: &SessionLookup) -> Result<ResolvedSession>;
}
