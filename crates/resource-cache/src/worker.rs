//! Background thread handles with a bounded join.
//!
//! `std` offers no timed join, so each worker owns the sending half of a
//! zero-capacity channel. The sender is dropped when the thread body returns
//! or unwinds, which wakes any waiter with `Disconnected`.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};

use crate::error::{CacheError, Result};

/// Result of waiting on a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The thread exited and was joined.
    Finished,
    /// The thread was still running at the deadline and has been detached.
    Abandoned,
}

#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    join: JoinHandle<()>,
    exited: Receiver<()>,
}

impl WorkerHandle {
    pub fn spawn<F>(name: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (exit_tx, exited) = bounded::<()>(0);
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _exit_tx = exit_tx;
                body();
            })
            .map_err(|source| CacheError::ThreadSpawn { name, source })?;
        Ok(Self { name, join, exited })
    }

    /// Whether the caller is running on this worker's own thread.
    pub fn is_current_thread(&self) -> bool {
        thread::current().id() == self.join.thread().id()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits up to `timeout` for the thread to exit.
    ///
    /// On timeout the handle is dropped without joining: the thread keeps
    /// running detached and whatever it references stays alive with it. A
    /// thread waiting on its own handle detaches immediately.
    pub fn wait(self, timeout: Duration) -> WaitOutcome {
        if self.is_current_thread() {
            log::debug!("{} thread released its own handle", self.name);
            return WaitOutcome::Abandoned;
        }
        match self.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.join.join().is_err() {
                    log::warn!("{} thread panicked", self.name);
                }
                WaitOutcome::Finished
            }
            Err(RecvTimeoutError::Timeout) => WaitOutcome::Abandoned,
        }
    }
}
