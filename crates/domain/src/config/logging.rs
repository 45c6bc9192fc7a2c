use serde::{Deserialize, Serialize};

use crate::records::LogLevel;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logging configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Local log output and forwarding of application logs to the ingestion
/// API.
///
/// Forwarding is off by default.  When enabled, every `tracing` event at or
/// above `forward_min_level` is converted into a `LogEntry` and uploaded
/// through a batcher, in addition to being written locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "d_filter")]
    pub filter: String,

    /// Emit JSON lines instead of the compact human format.
    #[serde(default)]
    pub json: bool,

    #[serde(default)]
    pub forward_logs: bool,

    #[serde(default = "d_min_level")]
    pub forward_min_level: LogLevel,

    /// Attach target/module/file/line and event fields as metadata.
    #[serde(default = "d_true")]
    pub forward_include_metadata: bool,

    /// Resource id stamped on every forwarded entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_resource_id: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: d_filter(),
            json: false,
            forward_logs: false,
            forward_min_level: d_min_level(),
            forward_include_metadata: true,
            forward_resource_id: None,
        }
    }
}

fn d_filter() -> String {
    "info".into()
}

fn d_min_level() -> LogLevel {
    LogLevel::Info
}

fn d_true() -> bool {
    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
