use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ingestion API connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const DEFAULT_BASE_URL: &str =
    "https://lpvbvnqrozlwalnkvrgk.supabase.co/functions/v1/monkai-api";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Tracer token sent in the `tracer_token` header.  When unset, the
    /// variable named by `token_env` is consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracer_token: Option<String>,
    #[serde(default = "d_token_env")]
    pub token_env: String,
    #[serde(default = "d_30000")]
    pub timeout_ms: u64,
    #[serde(default = "d_3")]
    pub max_retries: u32,
    /// Records per request when uploading a batch.
    #[serde(default = "d_100")]
    pub chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            tracer_token: None,
            token_env: d_token_env(),
            timeout_ms: 30_000,
            max_retries: 3,
            chunk_size: 100,
        }
    }
}

impl ClientConfig {
    /// Build a config with an explicit token and default everything else.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            tracer_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// The effective tracer token: explicit value first, then the env var.
    /// Blank values count as missing.
    pub fn resolve_token(&self) -> Option<String> {
        self.tracer_token
            .clone()
            .or_else(|| std::env::var(&self.token_env).ok())
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    DEFAULT_BASE_URL.into()
}
fn d_token_env() -> String {
    "MONKAI_TRACER_TOKEN".into()
}
fn d_30000() -> u64 {
    30_000
}
fn d_3() -> u32 {
    3
}
fn d_100() -> usize {
    100
}
