//! Batch coordinator
//!
//! `upload_all` commits the whole batch: every `pending` or `error` item is
//! transferred concurrently, `completed` items pass their URL through, and a
//! failing item never stops the others.

use super::activity::UploadScope;
use super::manager::UploadManager;
use super::{ItemStatus, UploadError};
use crate::metrics;
use crate::notify::Notice;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

/// Key shared by the running counter and the final summary
const BATCH_NOTICE_KEY: &str = "upload-batch";

/// Overall classification of a batch commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Nothing was tracked, or every item was skipped
    Empty,
    Completed,
    Partial,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Empty => "empty",
            BatchStatus::Completed => "completed",
            BatchStatus::Partial => "partial",
            BatchStatus::Failed => "failed",
        }
    }
}

/// Result of `upload_all`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub status: BatchStatus,
    /// URLs of successful items, in batch order
    pub urls: Vec<String>,
    pub succeeded: usize,
    pub failed: usize,
    /// Items removed mid-commit or already being uploaded elsewhere
    pub skipped: usize,
    pub total: usize,
}

impl BatchOutcome {
    fn empty() -> Self {
        Self {
            status: BatchStatus::Empty,
            urls: Vec::new(),
            succeeded: 0,
            failed: 0,
            skipped: 0,
            total: 0,
        }
    }
}

impl UploadManager {
    /// Commit the batch.
    ///
    /// Returns [`UploadError::Busy`] without touching any item when a commit
    /// is already running. The activity flag is released on every exit path.
    pub async fn upload_all(&self) -> Result<BatchOutcome, UploadError> {
        let Some(_guard) = self.inner.activity.try_begin(UploadScope::Batch) else {
            tracing::debug!("upload_all ignored: a batch commit is already running");
            return Err(UploadError::Busy);
        };

        match AssertUnwindSafe(self.run_batch()).catch_unwind().await {
            Ok(outcome) => Ok(outcome),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown error".to_string());

                tracing::error!(error = %message, "Batch commit aborted");
                metrics::record_batch("internal_error");
                self.inner.notifier.notify(
                    Notice::error("Upload failed unexpectedly")
                        .with_detail(message.clone())
                        .with_key(BATCH_NOTICE_KEY),
                );
                Err(UploadError::Internal(message))
            }
        }
    }

    #[tracing::instrument(
        name = "upload.batch",
        skip(self),
        fields(
            storage.bucket = %self.inner.policy.destination_bucket,
            batch.total = tracing::field::Empty
        )
    )]
    async fn run_batch(&self) -> BatchOutcome {
        let snapshot = self.items();
        if snapshot.is_empty() {
            self.inner.notifier.notify(Notice::info("No files to upload"));
            return BatchOutcome::empty();
        }

        let total = snapshot.len();
        tracing::Span::current().record("batch.total", total);

        let mut urls: Vec<Option<String>> = vec![None; total];
        let mut succeeded = 0;
        let mut failed = 0;
        let mut skipped = 0;

        let mut pending = FuturesUnordered::new();
        for (index, item) in snapshot.iter().enumerate() {
            match item.status {
                ItemStatus::Completed => {
                    urls[index] = item.result_url.clone();
                    succeeded += 1;
                }
                ItemStatus::Pending | ItemStatus::Error => {
                    let id = item.id;
                    pending.push(async move { (index, self.transfer(id, UploadScope::Batch).await) });
                }
                ItemStatus::Uploading => skipped += 1,
            }
        }

        self.report_progress(succeeded + failed + skipped, total);

        while let Some((index, result)) = pending.next().await {
            match result {
                Ok(url) => {
                    urls[index] = Some(url);
                    succeeded += 1;
                }
                Err(UploadError::Cancelled(_)) | Err(UploadError::ItemNotFound(_)) => skipped += 1,
                Err(_) => failed += 1,
            }
            self.report_progress(succeeded + failed + skipped, total);
        }

        let urls: Vec<String> = urls.into_iter().flatten().collect();
        let status = if succeeded == 0 && failed == 0 {
            BatchStatus::Empty
        } else if succeeded == 0 {
            BatchStatus::Failed
        } else if failed == 0 {
            BatchStatus::Completed
        } else {
            BatchStatus::Partial
        };

        metrics::record_batch(status.as_str());
        tracing::info!(
            status = status.as_str(),
            succeeded = succeeded,
            failed = failed,
            skipped = skipped,
            total = total,
            "Batch commit finished"
        );

        let summary = match status {
            BatchStatus::Completed => Notice::success(format!(
                "{} file{} uploaded successfully",
                succeeded,
                if succeeded == 1 { "" } else { "s" }
            )),
            BatchStatus::Partial => Notice::info("Upload partially completed")
                .with_detail(format!("{}/{} files uploaded", succeeded, total)),
            BatchStatus::Empty => Notice::info("No files to upload")
                .with_detail(format!("{} file{} skipped", skipped, if skipped == 1 { "" } else { "s" })),
            BatchStatus::Failed => Notice::error("Upload failed").with_detail("No files were uploaded"),
        };
        self.inner.notifier.notify(summary.with_key(BATCH_NOTICE_KEY));

        if !urls.is_empty() {
            self.inner.events.on_upload_complete(&urls);
        }

        BatchOutcome {
            status,
            urls,
            succeeded,
            failed,
            skipped,
            total,
        }
    }

    fn report_progress(&self, done: usize, total: usize) {
        self.inner.notifier.notify(
            Notice::info(format!("Uploading files ({}/{})", done, total)).with_key(BATCH_NOTICE_KEY),
        );
    }
}
