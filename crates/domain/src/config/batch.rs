use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Batching
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Upload batching.  `batch_size = 1` uploads every record immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "d_10")]
    pub batch_size: usize,

    /// Periodic flush for low-volume services.  `0` disables it.
    #[serde(default = "d_60")]
    pub flush_interval_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            flush_interval_secs: 60,
        }
    }
}

fn d_10() -> usize {
    10
}
fn d_60() -> u64 {
    60
}
