//! Notification sink
//!
//! Fire-and-forget channel for human-readable status messages. A notice
//! carrying a `key` replaces any earlier notice with the same key, which is
//! how a batch keeps one running counter instead of flooding the surface.

use parking_lot::Mutex;
use std::fmt;

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoticeKind::Success => "success",
            NoticeKind::Error => "error",
            NoticeKind::Info => "info",
        })
    }
}

/// A single notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub detail: Option<String>,
    /// Notices sharing a key replace each other
    pub key: Option<String>,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            key: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, message)
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Notification sink
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        let detail = notice.detail.as_deref().unwrap_or("");
        let key = notice.key.as_deref().unwrap_or("");
        match notice.kind {
            NoticeKind::Error => {
                tracing::warn!(kind = %notice.kind, key = %key, detail = %detail, "{}", notice.message)
            }
            _ => tracing::info!(kind = %notice.kind, key = %key, detail = %detail, "{}", notice.message),
        }
    }
}

/// Keeps every notice in memory; useful to assert on what a user would see
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notice, in emission order
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn count(&self, kind: NoticeKind) -> usize {
        self.notices.lock().iter().filter(|n| n.kind == kind).count()
    }

    /// What is currently visible: keyed notices collapse to their latest version
    pub fn visible(&self) -> Vec<Notice> {
        let notices = self.notices.lock();
        let mut visible: Vec<Notice> = Vec::with_capacity(notices.len());
        for notice in notices.iter() {
            let existing = notice
                .key
                .as_ref()
                .and_then(|key| visible.iter().position(|n| n.key.as_ref() == Some(key)));
            match existing {
                Some(pos) => visible[pos] = notice.clone(),
                None => visible.push(notice.clone()),
            }
        }
        visible
    }

    pub fn clear(&self) {
        self.notices.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
