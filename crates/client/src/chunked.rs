//! Chunked batch upload.

use std::future::Future;

use mt_domain::error::Result;

use crate::types::{ChunkFailure, UploadResponse, UploadSummary};

/// Upload `items` in slices of at most `chunk_size`, one request per slice.
///
/// A failed chunk is recorded in the summary and the remaining chunks are
/// still attempted, in order.
pub async fn upload_in_chunks<'a, T, F, Fut>(
    items: &'a [T],
    chunk_size: usize,
    upload: F,
) -> UploadSummary
where
    F: Fn(&'a [T]) -> Fut,
    Fut: Future<Output = Result<UploadResponse>>,
{
    let chunk_size = chunk_size.max(1);
    let mut summary = UploadSummary {
        total_inserted: 0,
        total_records: items.len(),
        failures: Vec::new(),
    };

    for (chunk_index, chunk) in items.chunks(chunk_size).enumerate() {
        match upload(chunk).await {
            Ok(resp) => summary.total_inserted += resp.inserted_count,
            Err(e) => {
                tracing::warn!(
                    chunk_index,
                    records = chunk.len(),
                    error = %e,
                    "chunk upload failed"
                );
                summary.failures.push(ChunkFailure {
                    chunk_index,
                    first_record: chunk_index * chunk_size,
                    record_count: chunk.len(),
                    error: e.to_string(),
                });
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_domain::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn inserted(n: usize) -> UploadResponse {
        UploadResponse {
            inserted_count: n as u64,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn splits_into_bounded_chunks() {
        let items: Vec<u32> = (0..250).collect();
        let calls = AtomicUsize::new(0);
        let summary = upload_in_chunks(&items, 100, |chunk| {
            calls.fetch_add(1, Ordering::SeqCst);
            let n = chunk.len();
            async move { Ok(inserted(n)) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(summary.total_inserted, 250);
        assert_eq!(summary.total_records, 250);
        assert!(summary.is_complete());
    }

    #[tokio::test]
    async fn failed_chunk_does_not_stop_the_rest() {
        let items: Vec<u32> = (0..5).collect();
        let summary = upload_in_chunks(&items, 2, |chunk| {
            let first = chunk[0];
            let n = chunk.len();
            async move {
                if first == 2 {
                    Err(Error::Http("connection reset".into()))
                } else {
                    Ok(inserted(n))
                }
            }
        })
        .await;

        assert_eq!(summary.total_inserted, 3);
        assert_eq!(summary.failures.len(), 1);
        let failure = &summary.failures[0];
        assert_eq!(failure.chunk_index, 1);
        assert_eq!(failure.range(), 2..4);
        assert!(failure.error.contains("connection reset"));
    }

    #[tokio::test]
    async fn empty_input_sends_nothing() {
        let items: Vec<u32> = Vec::new();
        let summary = upload_in_chunks(&items, 10, |_| async {
            Err::<UploadResponse, _>(Error::Other("must not be called".into()))
        })
        .await;
        assert_eq!(summary, UploadSummary::default());
    }
}
