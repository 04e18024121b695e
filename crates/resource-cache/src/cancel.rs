//! Cooperative cancellation for background scans and the watcher thread.
//!
//! Cancellation is never preemptive. Workers check the token at fixed
//! boundaries (before each resource kind is scanned) and a scan that has
//! started always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Granularity of [`CancellationToken::sleep`].
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// A shared flag that requests background work to stop.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Some(())` while still active and `None` once cancelled.
    /// This enables use with the `?` operator for early returns.
    #[inline]
    pub fn active(&self) -> Option<()> {
        if self.is_cancelled() {
            None
        } else {
            Some(())
        }
    }

    /// Sleeps for `duration`, waking early when cancelled.
    ///
    /// Returns `None` if cancellation was observed.
    pub fn sleep(&self, duration: Duration) -> Option<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.active()?;
            let now = Instant::now();
            if now >= deadline {
                return Some(());
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
