//! Directory watching for the resource folders.
//!
//! Each folder gets its own `notify` watcher; both feed a single channel read
//! by the `resource-cache-watch` thread. A batch (one notify event) asks for
//! at most one refresh, and the coordinator's single-flight guard absorbs
//! bursts across batches.

mod filter;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use notify::{recommended_watcher, Event, RecommendedWatcher, RecursiveMode, Watcher};

pub use filter::{is_relevant_path, WatchFilter};

use crate::cancel::CancellationToken;
use crate::error::{CacheError, Result};
use crate::locator::ResourceLocator;
use crate::settings::CacheSettings;
use crate::types::ResourceKind;
use crate::worker::{WaitOutcome, WorkerHandle};

pub const WATCH_THREAD_NAME: &str = "resource-cache-watch";

/// Receives refresh requests from the watcher thread.
pub trait RefreshTrigger: Send + Sync {
    fn request_refresh(&self);
}

type WatchEvent = notify::Result<Event>;

#[derive(Debug, Clone, Copy)]
struct WatchTiming {
    grace: Duration,
    poll: Duration,
}

pub struct ResourceWatcher {
    token: CancellationToken,
    watchers: Vec<(ResourceKind, RecommendedWatcher)>,
    worker: Option<WorkerHandle>,
    stop_timeout: Duration,
}

impl std::fmt::Debug for ResourceWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<ResourceKind> = self.watchers.iter().map(|(kind, _)| *kind).collect();
        f.debug_struct("ResourceWatcher")
            .field("watching", &kinds)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ResourceWatcher {
    /// Arms a watcher on each resource folder and starts the watch thread.
    ///
    /// A folder that cannot be watched is skipped with a warning. Fails with
    /// [`CacheError::NoWatchableFolders`] when neither folder could be armed.
    pub fn start(
        locator: &ResourceLocator,
        settings: &CacheSettings,
        trigger: Arc<dyn RefreshTrigger>,
    ) -> Result<Self> {
        Self::start_filtered(locator, settings, WatchFilter::default(), trigger)
    }

    pub fn start_filtered(
        locator: &ResourceLocator,
        settings: &CacheSettings,
        filter: WatchFilter,
        trigger: Arc<dyn RefreshTrigger>,
    ) -> Result<Self> {
        let (event_tx, event_rx) = unbounded::<WatchEvent>();

        let mut watchers = Vec::with_capacity(2);
        for (kind, mode) in [
            (ResourceKind::Fonts, RecursiveMode::Recursive),
            (ResourceKind::Animations, RecursiveMode::NonRecursive),
        ] {
            let armed = locator
                .root(kind)
                .and_then(|root| create_folder_watcher(&root, mode, event_tx.clone()));
            match armed {
                Ok(watcher) => watchers.push((kind, watcher)),
                Err(error) => log::warn!("{kind} folder not watched: {error}"),
            }
        }
        drop(event_tx);

        if watchers.is_empty() {
            return Err(CacheError::NoWatchableFolders);
        }

        let token = CancellationToken::new();
        let timing = WatchTiming {
            grace: settings.watcher_grace(),
            poll: settings.watcher_poll_interval(),
        };
        let thread_token = token.clone();
        let worker = WorkerHandle::spawn(WATCH_THREAD_NAME, move || {
            run_watch_loop(event_rx, thread_token, filter, timing, trigger.as_ref());
        })?;

        log::info!("resource watcher started folders={}", watchers.len());
        Ok(Self {
            token,
            watchers,
            worker: Some(worker),
            stop_timeout: settings.watcher_stop_timeout(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    pub fn is_watching(&self, kind: ResourceKind) -> bool {
        self.watchers.iter().any(|(watched, _)| *watched == kind)
    }

    /// Stops the watch thread, waiting up to the configured stop timeout.
    pub fn stop(mut self) -> WaitOutcome {
        self.shutdown()
    }

    fn shutdown(&mut self) -> WaitOutcome {
        self.token.cancel();
        self.watchers.clear();
        let Some(worker) = self.worker.take() else {
            return WaitOutcome::Finished;
        };
        if worker.is_current_thread() {
            // Dropped from inside the watch loop; it exits once the trigger returns.
            log::debug!("resource watcher released from its own thread");
            return worker.wait(Duration::ZERO);
        }
        let outcome = worker.wait(self.stop_timeout);
        match outcome {
            WaitOutcome::Finished => log::info!("resource watcher stopped"),
            WaitOutcome::Abandoned => log::warn!(
                "resource watcher did not stop within {:?}, detaching",
                self.stop_timeout
            ),
        }
        outcome
    }
}

impl Drop for ResourceWatcher {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}

fn create_folder_watcher(
    root: &Path,
    mode: RecursiveMode,
    event_tx: Sender<WatchEvent>,
) -> Result<RecommendedWatcher> {
    if !root.is_dir() {
        return Err(CacheError::Watcher(format!(
            "folder does not exist: {}",
            root.display()
        )));
    }

    let mut watcher = recommended_watcher(move |event: WatchEvent| {
        let _ = event_tx.send(event);
    })
    .map_err(|error| {
        CacheError::Watcher(format!(
            "failed to create watcher for {}: {error}",
            root.display()
        ))
    })?;

    watcher.watch(root, mode).map_err(|error| {
        CacheError::Watcher(format!("failed to watch {}: {error}", root.display()))
    })?;

    Ok(watcher)
}

fn run_watch_loop(
    events: Receiver<WatchEvent>,
    token: CancellationToken,
    filter: WatchFilter,
    timing: WatchTiming,
    trigger: &dyn RefreshTrigger,
) {
    if token.sleep(timing.grace).is_none() {
        return;
    }
    // Changes made during the grace period are covered by the startup scan.
    while events.try_recv().is_ok() {}

    while !token.is_cancelled() {
        match events.recv_timeout(timing.poll) {
            Ok(Ok(event)) => {
                if !filter.accepts(&event.kind) {
                    continue;
                }
                if let Some(path) = event.paths.iter().find(|path| is_relevant_path(path)) {
                    log::debug!("resource change detected path={}", path.display());
                    trigger.request_refresh();
                }
            }
            Ok(Err(error)) => log::warn!("resource watcher error: {error}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
