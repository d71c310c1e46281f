//! Upload manager
//!
//! The component a caller holds: owns the resolved policy, the batch, the
//! activity tracker and the collaborators (store, notifier, callbacks).
//! Cloning is cheap; clones share the same batch.
//!
//! # Example
//!
//! ```no_run
//! use media_uploadr::policy::Purpose;
//! use media_uploadr::storage::MemoryStore;
//! use media_uploadr::upload::{SourceFile, UploadManager};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let manager = UploadManager::builder(Arc::new(MemoryStore::new()))
//!     .purpose(Purpose::Media)
//!     .user_id(Some("agent-7".to_string()))
//!     .build();
//!
//! manager
//!     .add_files(vec![SourceFile::new("a.png", "image/png", vec![0u8; 64])])
//!     .await;
//! let outcome = manager.upload_all().await.unwrap();
//! println!("{:?}", outcome.urls);
//! # }
//! ```

use super::activity::{Activity, UploadScope};
use super::batch::BatchState;
use super::intake::{self, IntakeMode, IntakeReport};
use super::{ItemId, SourceFile, UploadError, UploadItem};
use crate::config::UploadConfig;
use crate::events::{NoEvents, UploadEvents};
use crate::metrics;
use crate::notify::{LogNotifier, Notice, Notifier};
use crate::policy::{self, PolicyOverrides, Rejection, UploadPolicy};
use crate::storage::ObjectStore;
use futures::future::AbortHandle;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) struct Inner {
    pub(crate) policy: UploadPolicy,
    pub(crate) settings: UploadConfig,
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) events: Arc<dyn UploadEvents>,
    pub(crate) user_id: Option<String>,
    pub(crate) state: Mutex<BatchState>,
    pub(crate) activity: Arc<Activity>,
    pub(crate) in_flight: Mutex<HashMap<ItemId, AbortHandle>>,
    pub(crate) current_file_url: Mutex<Option<String>>,
    next_id: AtomicU64,
}

/// Handle to one upload component
#[derive(Clone)]
pub struct UploadManager {
    pub(crate) inner: Arc<Inner>,
}

/// Builder for [`UploadManager`]
pub struct UploadManagerBuilder {
    store: Arc<dyn ObjectStore>,
    purpose_tag: String,
    overrides: PolicyOverrides,
    policy: Option<UploadPolicy>,
    settings: UploadConfig,
    notifier: Arc<dyn Notifier>,
    events: Arc<dyn UploadEvents>,
    user_id: Option<String>,
    current_file_url: Option<String>,
}

impl UploadManagerBuilder {
    /// Purpose whose built-in policy is used
    #[must_use]
    pub fn purpose(mut self, purpose: policy::Purpose) -> Self {
        self.purpose_tag = purpose.as_str().to_string();
        self
    }

    /// Free-form purpose tag; unknown tags resolve to the restrictive fallback
    #[must_use]
    pub fn purpose_tag(mut self, tag: &str) -> Self {
        self.purpose_tag = tag.to_string();
        self
    }

    #[must_use]
    pub fn overrides(mut self, overrides: PolicyOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Use a fully resolved policy, ignoring purpose and overrides
    #[must_use]
    pub fn policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: UploadConfig) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn events(mut self, events: Arc<dyn UploadEvents>) -> Self {
        self.events = events;
        self
    }

    /// Identifier used to namespace generated names
    #[must_use]
    pub fn user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// File currently on record, e.g. an existing avatar
    #[must_use]
    pub fn current_file_url(mut self, url: Option<String>) -> Self {
        self.current_file_url = url.filter(|u| !u.is_empty());
        self
    }

    pub fn build(self) -> UploadManager {
        let policy = self
            .policy
            .unwrap_or_else(|| policy::resolve_tag(&self.purpose_tag, &self.overrides));

        tracing::debug!(
            purpose = %policy.purpose,
            bucket = %policy.destination_bucket,
            allow_multiple = policy.allow_multiple,
            max_items = policy.max_items,
            max_bytes = policy.max_bytes,
            accept = %policy.accept,
            auto_commit = policy.auto_commit,
            "Upload manager created"
        );

        UploadManager {
            inner: Arc::new(Inner {
                policy,
                settings: self.settings,
                store: self.store,
                notifier: self.notifier,
                events: self.events,
                user_id: self.user_id,
                state: Mutex::new(BatchState::default()),
                activity: Activity::new(),
                in_flight: Mutex::new(HashMap::new()),
                current_file_url: Mutex::new(self.current_file_url),
                next_id: AtomicU64::new(1),
            }),
        }
    }
}

impl UploadManager {
    pub fn builder(store: Arc<dyn ObjectStore>) -> UploadManagerBuilder {
        UploadManagerBuilder {
            store,
            purpose_tag: policy::Purpose::File.as_str().to_string(),
            overrides: PolicyOverrides::default(),
            policy: None,
            settings: UploadConfig::default(),
            notifier: Arc::new(LogNotifier),
            events: Arc::new(NoEvents),
            user_id: None,
            current_file_url: None,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.inner.policy
    }

    /// Snapshot of the batch, in insertion order
    pub fn items(&self) -> Arc<[UploadItem]> {
        self.inner.state.lock().items()
    }

    pub fn item(&self, id: ItemId) -> Option<UploadItem> {
        self.inner.state.lock().get(id).cloned()
    }

    /// True while a batch commit or a single-item upload is running
    pub fn is_uploading(&self) -> bool {
        self.inner.activity.is_active()
    }

    pub fn is_uploading_scope(&self, scope: UploadScope) -> bool {
        self.inner.activity.is_scope_active(scope)
    }

    /// File on record for single-mode policies
    pub fn current_file_url(&self) -> Option<String> {
        self.inner.current_file_url.lock().clone()
    }

    fn next_id(&self) -> ItemId {
        ItemId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Apply a change to one item and swap the batch. `None` if the item is
    /// gone or `f` declined the change.
    pub(crate) fn update_item<F>(&self, id: ItemId, f: F) -> Option<UploadItem>
    where
        F: FnOnce(&UploadItem) -> Option<UploadItem>,
    {
        let mut state = self.inner.state.lock();
        let (next, updated) = state.with_item(id, f)?;
        *state = next;
        Some(updated)
    }

    /// Validate a selection and admit the accepted files.
    ///
    /// For auto-commit policies the accepted file is uploaded right away and
    /// this call resolves once that upload has.
    pub async fn add_files(&self, files: Vec<SourceFile>) -> IntakeReport {
        if files.is_empty() {
            return IntakeReport::default();
        }

        if self.inner.activity.is_scope_active(UploadScope::Batch) {
            let rejected: Vec<Rejection> = files
                .into_iter()
                .map(|file| Rejection::Busy { name: file.name })
                .collect();
            self.report_rejections(&rejected);
            return IntakeReport {
                rejected,
                ..Default::default()
            };
        }

        let (accepted, rejected, replaced) = {
            let mut state = self.inner.state.lock();
            let plan = intake::plan(&self.inner.policy, state.len(), files);
            let items: Vec<UploadItem> = plan
                .accepted
                .into_iter()
                .map(|file| UploadItem::new(self.next_id(), file))
                .collect();
            let accepted: Vec<ItemId> = items.iter().map(|item| item.id).collect();

            let mut replaced = Vec::new();
            if !items.is_empty() {
                *state = match plan.mode {
                    IntakeMode::Replace => {
                        replaced = state.ids();
                        BatchState::from_items(items)
                    }
                    IntakeMode::Append => state.appended(items),
                };
            }
            (accepted, plan.rejected, replaced)
        };

        for id in replaced {
            self.cancel_transfer(id);
        }
        self.report_rejections(&rejected);

        tracing::debug!(
            accepted = accepted.len(),
            rejected = rejected.len(),
            "Files added"
        );

        let mut report = IntakeReport {
            accepted,
            rejected,
            committed: None,
        };

        if self.inner.policy.auto_commit {
            if let Some(&id) = report.accepted.first() {
                report.committed = Some(self.upload_one(id).await);
            }
        }

        report
    }

    fn report_rejections(&self, rejected: &[Rejection]) {
        for rejection in rejected {
            metrics::record_rejection(rejection.reason());
            self.inner
                .notifier
                .notify(Notice::error(format!("{} was not added", rejection.file_name()))
                    .with_detail(rejection.to_string()));
        }
    }

    /// Stop tracking an item. An in-flight transfer for it is aborted and its
    /// result is never observed.
    pub fn remove_file(&self, id: ItemId) -> bool {
        let removed = {
            let mut state = self.inner.state.lock();
            match state.without(id) {
                Some(next) => {
                    *state = next;
                    true
                }
                None => false,
            }
        };

        if removed {
            self.cancel_transfer(id);
            tracing::debug!(item = %id, "File removed");
            if !self.inner.policy.allow_multiple {
                self.clear_current_file();
            }
        }
        removed
    }

    /// Drop every item, aborting in-flight transfers
    pub fn clear_files(&self) {
        let ids = {
            let mut state = self.inner.state.lock();
            let ids = state.ids();
            *state = BatchState::default();
            ids
        };

        for id in &ids {
            self.cancel_transfer(*id);
        }

        if !self.inner.policy.allow_multiple
            && (!ids.is_empty() || self.inner.current_file_url.lock().is_some())
        {
            self.clear_current_file();
        }
    }

    fn clear_current_file(&self) {
        *self.inner.current_file_url.lock() = None;
        self.inner.events.on_file_change("");
    }

    pub(crate) fn cancel_transfer(&self, id: ItemId) {
        if let Some(handle) = self.inner.in_flight.lock().remove(&id) {
            tracing::debug!(item = %id, "Aborting in-flight transfer");
            handle.abort();
        }
    }
}
