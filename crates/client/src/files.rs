//! Loaders for exported JSON files (`{"records": [...]}` / `{"logs": [...]}`).

use std::path::Path;

use serde::Deserialize;

use mt_domain::error::{Error, Result};
use mt_domain::records::{ConversationRecord, LogEntry};

#[derive(Deserialize)]
struct RecordsFile {
    records: Vec<ConversationRecord>,
}

#[derive(Deserialize)]
struct LogsFile {
    logs: Vec<LogEntry>,
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("reading {}: {e}", path.display()),
        ))
    })
}

/// Load conversation records from a `{"records": [...]}` file.
pub fn load_records(path: &Path) -> Result<Vec<ConversationRecord>> {
    let file: RecordsFile = serde_json::from_str(&read(path)?)?;
    tracing::info!(path = %path.display(), count = file.records.len(), "loaded records");
    Ok(file.records)
}

/// Load log entries from a `{"logs": [...]}` file.  Entries without a
/// namespace get `namespace`.
pub fn load_logs(path: &Path, namespace: &str) -> Result<Vec<LogEntry>> {
    let file: LogsFile = serde_json::from_str(&read(path)?)?;
    let logs: Vec<LogEntry> = file
        .logs
        .into_iter()
        .map(|mut log| {
            if log.namespace.trim().is_empty() {
                log.namespace = namespace.to_owned();
            }
            log
        })
        .collect();
    tracing::info!(path = %path.display(), count = logs.len(), "loaded logs");
    Ok(logs)
}
