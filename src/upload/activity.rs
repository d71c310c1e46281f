//! Upload activity
//!
//! One capability answers "is an upload operation in progress", scoped to a
//! batch commit or a single-item upload. Nothing new may begin while a batch
//! commit is running. Guards release on drop, so every exit path (including
//! a panic) clears the flag.

use parking_lot::Mutex;
use std::sync::Arc;

/// What an upload operation covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadScope {
    Batch,
    Single,
}

#[derive(Debug, Default)]
struct ActivityState {
    batch: bool,
    single: usize,
}

/// Shared activity tracker
#[derive(Debug, Default)]
pub struct Activity {
    state: Mutex<ActivityState>,
}

impl Activity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Begin an operation, or `None` while a batch commit is running
    pub fn try_begin(self: &Arc<Self>, scope: UploadScope) -> Option<ActivityGuard> {
        let mut state = self.state.lock();
        if state.batch {
            return None;
        }
        match scope {
            UploadScope::Batch => state.batch = true,
            UploadScope::Single => state.single += 1,
        }
        Some(ActivityGuard {
            activity: Arc::clone(self),
            scope,
        })
    }

    /// True while any operation is in progress
    pub fn is_active(&self) -> bool {
        let state = self.state.lock();
        state.batch || state.single > 0
    }

    pub fn is_scope_active(&self, scope: UploadScope) -> bool {
        let state = self.state.lock();
        match scope {
            UploadScope::Batch => state.batch,
            UploadScope::Single => state.single > 0,
        }
    }
}

/// Marks an operation as running until dropped
#[derive(Debug)]
pub struct ActivityGuard {
    activity: Arc<Activity>,
    scope: UploadScope,
}

impl ActivityGuard {
    pub fn scope(&self) -> UploadScope {
        self.scope
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        let mut state = self.activity.state.lock();
        match self.scope {
            UploadScope::Batch => state.batch = false,
            UploadScope::Single => state.single = state.single.saturating_sub(1),
        }
    }
}
