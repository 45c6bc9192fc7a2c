//! `monkai-trace upload-records` / `upload-logs`: push exported JSON files.

use std::path::Path;

use mt_client::files::{load_logs, load_records};
use mt_client::{RestIngestClient, UploadSummary};

pub async fn records(client: &RestIngestClient, file: &Path) -> anyhow::Result<()> {
    let records = load_records(file)?;
    if records.is_empty() {
        println!("No records in {}", file.display());
        return Ok(());
    }
    let summary = client.upload_records_batch(&records).await;
    report("records", &summary)
}

pub async fn logs(client: &RestIngestClient, file: &Path, namespace: &str) -> anyhow::Result<()> {
    mt_domain::config::validate_namespace(namespace)?;
    let logs = load_logs(file, namespace)?;
    if logs.is_empty() {
        println!("No logs in {}", file.display());
        return Ok(());
    }
    let summary = client.upload_logs_batch(&logs).await;
    report("logs", &summary)
}

/// Print the summary; any failed chunk makes the command fail.
fn report(kind: &str, summary: &UploadSummary) -> anyhow::Result<()> {
    println!(
        "Uploaded {kind}: {} inserted of {}",
        summary.total_inserted, summary.total_records
    );
    for failure in &summary.failures {
        let range = failure.range();
        println!(
            "  chunk {} ({kind} {}..{}) failed: {}",
            failure.chunk_index, range.start, range.end, failure.error
        );
    }
    if !summary.is_complete() {
        anyhow::bail!(
            "{} of {} {kind} were not uploaded",
            summary.failed_records(),
            summary.total_records
        );
    }
    Ok(())
}
