//! Upload engine
//!
//! Drives one item through `uploading` to `completed` or `error`.

use super::activity::UploadScope;
use super::manager::UploadManager;
use super::naming;
use super::ticker::ProgressTicker;
use super::{ItemId, ItemStatus, UploadError, UploadItem};
use crate::metrics;
use crate::notify::Notice;
use crate::storage::StoreOptions;
use futures::future::{AbortHandle, Abortable};
use std::time::Instant;

impl UploadManager {
    /// Upload one item outside of a batch commit.
    ///
    /// Refused with [`UploadError::Busy`] while a batch commit is running.
    /// A completed item resolves to its existing URL without a new transfer.
    pub async fn upload_one(&self, id: ItemId) -> Result<String, UploadError> {
        let Some(_guard) = self.inner.activity.try_begin(UploadScope::Single) else {
            return Err(UploadError::Busy);
        };
        self.transfer(id, UploadScope::Single).await
    }

    #[tracing::instrument(
        name = "upload.transfer",
        skip(self),
        fields(
            upload.item = %id,
            upload.file = tracing::field::Empty,
            storage.bucket = %self.inner.policy.destination_bucket,
            storage.key = tracing::field::Empty
        ),
        err
    )]
    pub(crate) async fn transfer(&self, id: ItemId, scope: UploadScope) -> Result<String, UploadError> {
        let (abort_handle, registration) = AbortHandle::new_pair();
        let started = {
            let mut state = self.inner.state.lock();
            let item = state.get(id).ok_or(UploadError::ItemNotFound(id))?;

            if item.status == ItemStatus::Completed {
                if let Some(url) = &item.result_url {
                    return Ok(url.clone());
                }
            }

            let started = item.begin()?;
            if let Some((next, _)) = state.with_item(id, |_| Some(started.clone())) {
                *state = next;
            }
            // registered before the lock drops so a concurrent removal always finds it
            self.inner.in_flight.lock().insert(id, abort_handle);
            started
        };
        let mut interrupt = InterruptGuard {
            manager: self,
            id,
            armed: true,
        };

        let policy = &self.inner.policy;
        let bucket = policy.destination_bucket.as_str();
        let name = naming::destination_name(
            policy.purpose,
            self.inner.user_id.as_deref(),
            chrono::Utc::now(),
            id.get(),
            &started.file_name,
        );
        let span = tracing::Span::current();
        span.record("upload.file", started.file_name.as_str());
        span.record("storage.key", name.as_str());

        let body = started.body().cloned().unwrap_or_default();
        let bytes = body.len() as u64;
        let options = StoreOptions {
            overwrite_existing: policy.overwrite_existing,
        };
        let timeout = self.inner.settings.transfer_timeout();

        let ticker = self.spawn_ticker(id);
        let start_time = Instant::now();

        let outcome = Abortable::new(
            tokio::time::timeout(
                timeout,
                self.inner.store.store(
                    bucket,
                    &name,
                    body,
                    Some(started.mime_type.as_str()),
                    options,
                ),
            ),
            registration,
        )
        .await;

        interrupt.disarm();
        drop(ticker);
        self.inner.in_flight.lock().remove(&id);
        metrics::record_transfer_duration(bucket, start_time.elapsed().as_secs_f64());

        let result = match outcome {
            Err(_aborted) => {
                metrics::record_transfer_failure(bucket, "cancelled");
                tracing::debug!(key = %name, "Transfer aborted after item removal");
                return Err(UploadError::Cancelled(started.file_name));
            }
            Ok(Err(_elapsed)) => {
                metrics::record_transfer_failure(bucket, "timeout");
                Err(UploadError::Timeout {
                    name: started.file_name.clone(),
                    secs: timeout.as_secs(),
                })
            }
            Ok(Ok(Err(e))) => {
                metrics::record_transfer_failure(bucket, "failure");
                Err(UploadError::Store(e))
            }
            Ok(Ok(Ok(stored))) => Ok(self.inner.store.public_url(bucket, &stored.path)),
        };

        match result {
            Ok(url) => self.on_transfer_success(id, &started, url, bytes, scope),
            Err(e) => self.on_transfer_failure(id, &started, e),
        }
    }

    fn spawn_ticker(&self, id: ItemId) -> ProgressTicker {
        let manager = self.clone();
        let step = self.inner.settings.progress_step;
        let cap = self.inner.settings.progress_cap;
        ProgressTicker::spawn(self.inner.settings.progress_interval(), move || {
            manager
                .update_item(id, |item| item.advance(step, cap))
                .is_some_and(|item| item.progress < cap)
        })
    }

    fn on_transfer_success(
        &self,
        id: ItemId,
        started: &UploadItem,
        url: String,
        bytes: u64,
        scope: UploadScope,
    ) -> Result<String, UploadError> {
        let bucket = self.inner.policy.destination_bucket.as_str();
        metrics::record_transfer_success(bucket, bytes);

        let updated = self.update_item(id, |item| {
            (item.status == ItemStatus::Uploading).then(|| item.complete(url.clone()))
        });
        if updated.is_none() {
            // removed while the store call was resolving
            return Err(UploadError::Cancelled(started.file_name.clone()));
        }

        tracing::info!(
            file = %started.file_name,
            url = %url,
            bytes = bytes,
            "Upload completed"
        );

        if !self.inner.policy.allow_multiple {
            *self.inner.current_file_url.lock() = Some(url.clone());
            self.inner.events.on_file_change(&url);
        }
        if scope == UploadScope::Single {
            self.inner
                .notifier
                .notify(Notice::success(format!("{} uploaded", started.file_name)));
        }

        Ok(url)
    }

    fn on_transfer_failure(
        &self,
        id: ItemId,
        started: &UploadItem,
        error: UploadError,
    ) -> Result<String, UploadError> {
        let message = match &error {
            UploadError::Store(e) => e.to_string(),
            other => other.to_string(),
        };

        let updated = self.update_item(id, |item| {
            (item.status == ItemStatus::Uploading).then(|| item.fail(message.clone()))
        });
        if updated.is_none() {
            return Err(UploadError::Cancelled(started.file_name.clone()));
        }

        tracing::warn!(file = %started.file_name, error = %message, "Upload failed");
        self.inner.notifier.notify(
            Notice::error(format!("Failed to upload {}", started.file_name)).with_detail(message),
        );

        Err(error)
    }
}

/// Message recorded on an item whose transfer was dropped before resolving
pub(crate) const INTERRUPTED: &str = "Upload interrupted";

/// Fails an `uploading` item if its transfer future is dropped before the
/// store call resolves (caller dropped the future, or a panic unwound it).
struct InterruptGuard<'a> {
    manager: &'a UploadManager,
    id: ItemId,
    armed: bool,
}

impl InterruptGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let inner = &self.manager.inner;
        inner.in_flight.lock().remove(&self.id);

        let failed = self.manager.update_item(self.id, |item| {
            (item.status == ItemStatus::Uploading).then(|| item.fail(INTERRUPTED.to_string()))
        });
        if let Some(item) = failed {
            metrics::record_transfer_failure(&inner.policy.destination_bucket, "interrupted");
            tracing::warn!(item = %self.id, file = %item.file_name, "Transfer interrupted");
        }
    }
}
