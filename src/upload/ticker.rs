//! Synthetic progress ticker
//!
//! The storage client reports no byte-level progress, so a periodic task
//! nudges the item's progress while the transfer is outstanding. The task is
//! aborted when the ticker is dropped.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct ProgressTicker {
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    /// Call `on_tick` every `period` until it returns `false` or the ticker drops.
    ///
    /// The first call happens one full period after spawning.
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                if !on_tick() {
                    break;
                }
            }
        });

        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
