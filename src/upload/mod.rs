//! Upload module
//!
//! Tracks selected files through their upload lifecycle:
//!
//! ```text
//! pending --(engine starts)--> uploading
//! uploading --(transfer ok)--> completed   [terminal]
//! uploading --(transfer fails)--> error
//! error --(re-submitted by upload_all)--> uploading
//! ```
//!
//! Items are never mutated in place. Every transition produces a new
//! [`UploadItem`] and the batch sequence is swapped as a whole (see
//! [`batch::BatchState`]).

use crate::storage::StoreError;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

pub mod activity;
pub mod batch;
pub mod coordinator;
mod engine;
pub mod intake;
pub mod manager;
pub mod naming;
pub mod ticker;

pub use activity::{Activity, ActivityGuard, UploadScope};
pub use batch::BatchState;
pub use coordinator::{BatchOutcome, BatchStatus};
pub use intake::IntakeReport;
pub use manager::{UploadManager, UploadManagerBuilder};

/// Upload errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("{name} cannot be uploaded while {status}")]
    InvalidTransition { name: String, status: ItemStatus },

    #[error("An upload is already in progress")]
    Busy,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Upload of {name} timed out after {secs}s")]
    Timeout { name: String, secs: u64 },

    #[error("Upload of {0} was cancelled")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable identifier of an item within one manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub(crate) u64);

impl ItemId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Item lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Uploading,
    Completed,
    Error,
}

impl ItemStatus {
    /// Whether the engine may move an item in this state to `Uploading`
    pub fn can_start(&self) -> bool {
        matches!(self, ItemStatus::Pending | ItemStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Uploading => "uploading",
            ItemStatus::Completed => "completed",
            ItemStatus::Error => "error",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file selected by the user: name, MIME type and contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// One tracked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    pub id: ItemId,
    pub file_name: String,
    pub size: u64,
    pub mime_type: String,
    pub status: ItemStatus,
    /// 0..=100, non-decreasing while uploading
    pub progress: u8,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    /// Released once the item completes
    body: Option<Bytes>,
}

impl UploadItem {
    pub(crate) fn new(id: ItemId, file: SourceFile) -> Self {
        Self {
            id,
            size: file.size(),
            file_name: file.name,
            mime_type: file.mime_type,
            status: ItemStatus::Pending,
            progress: 0,
            result_url: None,
            error_message: None,
            body: Some(file.data),
        }
    }

    /// File contents, `None` once released
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub(crate) fn begin(&self) -> Result<UploadItem, UploadError> {
        if !self.status.can_start() || self.body.is_none() {
            return Err(UploadError::InvalidTransition {
                name: self.file_name.clone(),
                status: self.status,
            });
        }
        Ok(UploadItem {
            status: ItemStatus::Uploading,
            progress: 0,
            error_message: None,
            ..self.clone()
        })
    }

    /// Next synthetic progress value, `None` if nothing changes
    pub(crate) fn advance(&self, step: u8, cap: u8) -> Option<UploadItem> {
        if self.status != ItemStatus::Uploading || self.progress >= cap {
            return None;
        }
        Some(UploadItem {
            progress: self.progress.saturating_add(step).min(cap),
            ..self.clone()
        })
    }

    pub(crate) fn complete(&self, url: String) -> UploadItem {
        UploadItem {
            status: ItemStatus::Completed,
            progress: 100,
            result_url: Some(url),
            error_message: None,
            body: None,
            ..self.clone()
        }
    }

    pub(crate) fn fail(&self, message: String) -> UploadItem {
        UploadItem {
            status: ItemStatus::Error,
            progress: 0,
            result_url: None,
            error_message: Some(message),
            ..self.clone()
        }
    }
}
