//! Caller-facing callbacks

use parking_lot::Mutex;

/// Callbacks a caller hooks into an upload manager
pub trait UploadEvents: Send + Sync {
    /// A single-mode item completed (`url`) or the single item was cleared (`""`)
    fn on_file_change(&self, _url: &str) {}

    /// A batch finished with at least one success; never called with an empty slice
    fn on_upload_complete(&self, _urls: &[String]) {}
}

/// Ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl UploadEvents for NoEvents {}

/// Records every event, in order
#[derive(Debug, Default)]
pub struct RecordingEvents {
    file_changes: Mutex<Vec<String>>,
    completions: Mutex<Vec<Vec<String>>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_changes(&self) -> Vec<String> {
        self.file_changes.lock().clone()
    }

    pub fn completions(&self) -> Vec<Vec<String>> {
        self.completions.lock().clone()
    }
}

impl UploadEvents for RecordingEvents {
    fn on_file_change(&self, url: &str) {
        self.file_changes.lock().push(url.to_string());
    }

    fn on_upload_complete(&self, urls: &[String]) {
        self.completions.lock().push(urls.to_vec());
    }
}
