//! The resource cache coordinator.
//!
//! [`ResourceCache`] owns the two stores, runs scans on a background worker,
//! keeps at most one scan in flight, and wires the directory watcher to
//! refresh requests. Every `initialize` builds a fresh [`Generation`]; a
//! worker that outlives shutdown keeps its own generation alive, so a later
//! `initialize` never shares state with it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::cancel::CancellationToken;
use crate::error::{CacheError, Result};
use crate::flight::{FlightTicket, SingleFlight};
use crate::locator::ResourceLocator;
use crate::scan::{report_failure, FsScanner, Scanner};
use crate::selection::SelectionSource;
use crate::settings::CacheSettings;
use crate::store::CacheStore;
use crate::types::{
    AnimationEntry, CacheSnapshot, CacheStatistics, CacheStatus, FontEntry, ResourceKind,
};
use crate::watcher::{RefreshTrigger, ResourceWatcher};
use crate::worker::{WaitOutcome, WorkerHandle};

pub const SCAN_THREAD_NAME: &str = "resource-cache-scan";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// There was nothing to shut down.
    NotInitialized,
    /// The worker exited in time and both stores were released.
    Graceful,
    /// The worker missed the deadline and was detached with its stores.
    Abandoned,
}

/// State owned by one `initialize`/`shutdown` cycle.
struct Generation {
    fonts: CacheStore<FontEntry>,
    animations: CacheStore<AnimationEntry>,
    flight: SingleFlight,
    token: CancellationToken,
    scan_complete: AtomicBool,
}

impl Generation {
    fn new(settings: &CacheSettings) -> Self {
        Self {
            fonts: CacheStore::new(settings.max_entries, settings.ttl()),
            animations: CacheStore::new(settings.max_entries, settings.ttl()),
            flight: SingleFlight::new(),
            token: CancellationToken::new(),
            scan_complete: AtomicBool::new(false),
        }
    }
}

#[derive(Default)]
struct Runtime {
    generation: Option<Arc<Generation>>,
    worker: Option<WorkerHandle>,
    watcher: Option<ResourceWatcher>,
}

struct CacheInner {
    settings: CacheSettings,
    locator: ResourceLocator,
    scanner: Arc<dyn Scanner>,
    runtime: Mutex<Runtime>,
}

/// Handle to the resource cache. Clones share the same cache.
#[derive(Clone)]
pub struct ResourceCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("locator", &self.inner.locator)
            .field("ready", &self.is_ready())
            .field("watcher_active", &self.is_watcher_active())
            .finish()
    }
}

impl ResourceCache {
    /// Creates a cache backed by the filesystem scanner.
    pub fn new(
        locator: ResourceLocator,
        settings: CacheSettings,
        selection: Arc<dyn SelectionSource>,
    ) -> Self {
        let scanner = FsScanner::new(locator.clone(), selection, settings.max_scan_depth);
        Self::with_scanner(locator, settings, Arc::new(scanner))
    }

    pub fn with_scanner(
        locator: ResourceLocator,
        settings: CacheSettings,
        scanner: Arc<dyn Scanner>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                settings,
                locator,
                scanner,
                runtime: Mutex::new(Runtime::default()),
            }),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.inner.locator
    }

    /// Brings the cache up. Calling it again while initialized does nothing.
    ///
    /// With `start_background_scan` the first scan runs on a worker thread
    /// after a short delay and the directory watcher is started; without it
    /// the stores stay `Invalid` until a refresh and nothing is watched.
    /// Failing to start the watcher only disables auto-refresh.
    pub fn initialize(&self, start_background_scan: bool) -> Result<()> {
        let mut runtime = self.inner.runtime.lock();
        if runtime.generation.is_some() {
            log::debug!("resource cache already initialized");
            return Ok(());
        }

        let generation = Arc::new(Generation::new(&self.inner.settings));
        if start_background_scan {
            if let Some(ticket) = generation.flight.try_begin() {
                let worker = spawn_scan_worker(
                    self.inner.scanner.clone(),
                    generation.clone(),
                    ticket,
                    self.inner.settings.worker_start_delay(),
                )
                .inspect_err(|error| {
                    log::error!("resource cache initialization failed: {error}");
                })?;
                runtime.worker = Some(worker);
            }
        }
        runtime.generation = Some(generation);

        if start_background_scan && self.inner.settings.watcher_enabled {
            self.start_watcher(&mut runtime);
        }

        log::info!(
            "resource cache initialized background_scan={} watcher={}",
            start_background_scan,
            runtime.watcher.is_some()
        );
        Ok(())
    }

    fn start_watcher(&self, runtime: &mut Runtime) {
        if runtime
            .watcher
            .as_ref()
            .is_some_and(ResourceWatcher::is_running)
        {
            return;
        }

        let trigger = Arc::new(WatchTrigger {
            cache: Arc::downgrade(&self.inner),
        });
        match ResourceWatcher::start(&self.inner.locator, &self.inner.settings, trigger) {
            Ok(watcher) => runtime.watcher = Some(watcher),
            Err(error) => log::warn!("resource watcher disabled: {error}"),
        }
    }

    /// Stops the watcher and the worker and releases the stores.
    ///
    /// A worker that does not finish within the shutdown timeout is detached
    /// and keeps its stores; the cache is uninitialized either way.
    pub fn shutdown(&self) -> ShutdownOutcome {
        let (generation, worker, watcher) = {
            let mut runtime = self.inner.runtime.lock();
            (
                runtime.generation.take(),
                runtime.worker.take(),
                runtime.watcher.take(),
            )
        };
        let Some(generation) = generation else {
            return ShutdownOutcome::NotInitialized;
        };

        generation.token.cancel();
        if let Some(watcher) = watcher {
            watcher.stop();
        }

        let timeout = self.inner.settings.shutdown_timeout();
        let outcome = worker.map_or(WaitOutcome::Finished, |worker| worker.wait(timeout));
        match outcome {
            WaitOutcome::Finished => {
                generation.fonts.release();
                generation.animations.release();
                log::info!("resource cache shut down");
                ShutdownOutcome::Graceful
            }
            WaitOutcome::Abandoned => {
                log::error!("resource scan worker did not exit within {timeout:?}");
                log::error!("abandoning resource scan worker, its cache memory is not released");
                ShutdownOutcome::Abandoned
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.generation().is_some()
    }

    pub fn is_background_scan_complete(&self) -> bool {
        self.generation()
            .is_some_and(|generation| generation.scan_complete.load(Ordering::Acquire))
    }

    /// Whether a scan worker currently holds the single-flight guard.
    pub fn is_refresh_in_progress(&self) -> bool {
        self.generation()
            .is_some_and(|generation| generation.flight.is_in_flight())
    }

    pub fn is_watcher_active(&self) -> bool {
        self.inner
            .runtime
            .lock()
            .watcher
            .as_ref()
            .is_some_and(ResourceWatcher::is_running)
    }

    /// Invalidates both stores and rescans them on a new worker.
    ///
    /// Does nothing while a scan is already running. The runtime lock is
    /// never held while a store lock is taken, so this is safe to call from
    /// inside [`with_fonts`](Self::with_fonts) and from the watcher.
    pub fn request_refresh(&self) {
        let Some((generation, ticket)) = self.begin_refresh() else {
            return;
        };

        generation.fonts.invalidate();
        generation.animations.invalidate();
        let worker = match spawn_scan_worker(
            self.inner.scanner.clone(),
            generation.clone(),
            ticket,
            self.inner.settings.worker_start_delay(),
        ) {
            Ok(worker) => worker,
            Err(error) => {
                log::error!("failed to start resource refresh: {error}");
                return;
            }
        };

        let mut runtime = self.inner.runtime.lock();
        let current = runtime
            .generation
            .as_ref()
            .is_some_and(|live| Arc::ptr_eq(live, &generation));
        if current {
            runtime.worker = Some(worker);
        } else {
            // Shut down meanwhile; the worker sees the cancelled token and exits.
            log::debug!("refresh worker detached, cache shut down during start");
        }
    }

    fn begin_refresh(&self) -> Option<(Arc<Generation>, FlightTicket)> {
        let runtime = self.inner.runtime.lock();
        let Some(generation) = runtime.generation.clone() else {
            log::debug!("refresh ignored, resource cache not initialized");
            return None;
        };
        if generation.token.is_cancelled() {
            return None;
        }
        let Some(ticket) = generation.flight.try_begin() else {
            log::debug!("refresh already in progress, skipping");
            return None;
        };
        Some((generation, ticket))
    }

    /// Rescans both stores on the calling thread.
    ///
    /// Both kinds are attempted; the first failure is returned.
    pub fn refresh_sync(&self) -> Result<()> {
        let generation = self.generation().ok_or(CacheError::NotInitialized)?;
        let fonts = self.inner.scanner.scan_fonts(&generation.fonts);
        let animations = self.inner.scanner.scan_animations(&generation.animations);
        if let Err(error) = &fonts {
            report_failure(ResourceKind::Fonts, error);
        }
        if let Err(error) = &animations {
            report_failure(ResourceKind::Animations, error);
        }
        fonts?;
        animations?;
        Ok(())
    }

    pub fn invalidate_all(&self) {
        if let Some(generation) = self.generation() {
            generation.fonts.invalidate();
            generation.animations.invalidate();
        }
    }

    /// Marks the font at `relative_path` as current. Returns whether it was found.
    pub fn update_current_font(&self, relative_path: &str) -> bool {
        self.generation()
            .is_some_and(|generation| generation.fonts.update_current(relative_path))
    }

    /// Marks the animation named `name` as current. Returns whether it was found.
    pub fn update_current_animation(&self, name: &str) -> bool {
        self.generation()
            .is_some_and(|generation| generation.animations.update_current(name))
    }

    pub fn font_status(&self) -> CacheStatus {
        self.generation()
            .map_or(CacheStatus::Error, |generation| generation.fonts.status())
    }

    pub fn animation_status(&self) -> CacheStatus {
        self.generation()
            .map_or(CacheStatus::Error, |generation| generation.animations.status())
    }

    pub fn fonts(&self) -> CacheSnapshot<FontEntry> {
        self.generation().map_or_else(
            || CacheSnapshot::unavailable(CacheStatus::Error),
            |generation| generation.fonts.snapshot(),
        )
    }

    pub fn animations(&self) -> CacheSnapshot<AnimationEntry> {
        self.generation().map_or_else(
            || CacheSnapshot::unavailable(CacheStatus::Error),
            |generation| generation.animations.snapshot(),
        )
    }

    /// Lends the font entries to `f`. See [`CacheStore::with_entries`].
    pub fn with_fonts<R>(&self, f: impl FnOnce(CacheStatus, Option<&[FontEntry]>) -> R) -> R {
        match self.generation() {
            Some(generation) => generation.fonts.with_entries(f),
            None => f(CacheStatus::Error, None),
        }
    }

    pub fn with_animations<R>(
        &self,
        f: impl FnOnce(CacheStatus, Option<&[AnimationEntry]>) -> R,
    ) -> R {
        match self.generation() {
            Some(generation) => generation.animations.with_entries(f),
            None => f(CacheStatus::Error, None),
        }
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.generation()
            .map(|generation| CacheStatistics {
                fonts: generation.fonts.statistics(),
                animations: generation.animations.statistics(),
            })
            .unwrap_or_default()
    }

    fn generation(&self) -> Option<Arc<Generation>> {
        self.inner.runtime.lock().generation.clone()
    }
}

struct WatchTrigger {
    cache: Weak<CacheInner>,
}

impl RefreshTrigger for WatchTrigger {
    fn request_refresh(&self) {
        if let Some(inner) = self.cache.upgrade() {
            ResourceCache { inner }.request_refresh();
        }
    }
}

fn spawn_scan_worker(
    scanner: Arc<dyn Scanner>,
    generation: Arc<Generation>,
    ticket: FlightTicket,
    start_delay: Duration,
) -> Result<WorkerHandle> {
    WorkerHandle::spawn(SCAN_THREAD_NAME, move || {
        let _ticket = ticket;
        if run_scan(scanner.as_ref(), &generation, start_delay).is_none() {
            log::info!("resource scan stopped by shutdown");
        }
    })
}

/// Scans fonts then animations, checking for shutdown in between.
fn run_scan(scanner: &dyn Scanner, generation: &Generation, start_delay: Duration) -> Option<()> {
    generation.token.sleep(start_delay)?;

    if let Err(error) = scanner.scan_fonts(&generation.fonts) {
        report_failure(ResourceKind::Fonts, &error);
    }
    generation.token.active()?;

    if let Err(error) = scanner.scan_animations(&generation.animations) {
        report_failure(ResourceKind::Animations, &error);
    }

    generation.scan_complete.store(true, Ordering::Release);
    log::info!("resource scan complete");
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::NoSelection;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn quiet_settings() -> CacheSettings {
        CacheSettings {
            worker_start_delay_ms: 0,
            watcher_enabled: false,
            ..CacheSettings::default()
        }
    }

    fn cache_in(temp: &TempDir) -> ResourceCache {
        let fonts = temp.path().join("resources/fonts");
        let animations = temp.path().join("resources/animations");
        fs::create_dir_all(&fonts).unwrap();
        fs::create_dir_all(&animations).unwrap();
        File::create(fonts.join("a.ttf")).unwrap();
        File::create(animations.join("wave.gif")).unwrap();
        ResourceCache::new(
            ResourceLocator::from_config_file(temp.path().join("config.ini")),
            quiet_settings(),
            Arc::new(NoSelection),
        )
    }

    #[test]
    fn uninitialized_cache_reports_error() {
        let temp = TempDir::new().unwrap();
        let cache = cache_in(&temp);

        assert!(!cache.is_ready());
        assert_eq!(cache.font_status(), CacheStatus::Error);
        assert_eq!(cache.animations().status, CacheStatus::Error);
        assert!(cache.with_fonts(|_, entries| entries.is_none()));
        assert!(matches!(cache.refresh_sync(), Err(CacheError::NotInitialized)));
        assert_eq!(cache.statistics(), CacheStatistics::default());
        assert!(!cache.update_current_font("a.ttf"));
    }

    #[test]
    fn initialize_without_scan_leaves_stores_invalid() {
        let temp = TempDir::new().unwrap();
        let cache = cache_in(&temp);

        cache.initialize(false).unwrap();
        assert!(cache.is_ready());
        assert_eq!(cache.font_status(), CacheStatus::Invalid);
        assert_eq!(cache.animation_status(), CacheStatus::Invalid);
        assert!(!cache.is_background_scan_complete());
        assert_eq!(cache.shutdown(), ShutdownOutcome::Graceful);
    }

    #[test]
    fn initialize_without_scan_does_not_watch() {
        let temp = TempDir::new().unwrap();
        cache_in(&temp);
        let cache = ResourceCache::new(
            ResourceLocator::from_config_file(temp.path().join("config.ini")),
            CacheSettings {
                watcher_enabled: true,
                ..quiet_settings()
            },
            Arc::new(NoSelection),
        );

        cache.initialize(false).unwrap();
        assert!(cache.is_ready());
        assert!(!cache.is_watcher_active());
        assert_eq!(cache.shutdown(), ShutdownOutcome::Graceful);
    }

    #[test]
    fn refresh_sync_populates_both_stores() {
        let temp = TempDir::new().unwrap();
        let cache = cache_in(&temp);
        cache.initialize(false).unwrap();

        cache.refresh_sync().unwrap();
        assert_eq!(cache.font_status(), CacheStatus::Ok);
        let stats = cache.statistics();
        assert_eq!(stats.fonts.count, 1);
        assert_eq!(stats.animations.count, 4);
        assert!(stats.fonts.scan_time.is_some());

        assert!(cache.update_current_font("A.TTF"));
        assert!(cache.update_current_animation("__cpu__"));
        assert!(!cache.update_current_animation("missing.gif"));

        cache.invalidate_all();
        assert_eq!(cache.font_status(), CacheStatus::Invalid);
        assert!(cache.fonts().entries.is_none());
        cache.shutdown();
    }

    #[test]
    fn background_scan_completes() {
        let temp = TempDir::new().unwrap();
        let cache = cache_in(&temp);
        cache.initialize(true).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !cache.is_background_scan_complete() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(cache.is_background_scan_complete());
        assert_eq!(cache.fonts().len(), 1);
        assert_eq!(cache.shutdown(), ShutdownOutcome::Graceful);
        assert_eq!(cache.shutdown(), ShutdownOutcome::NotInitialized);
    }

    #[test]
    fn second_initialize_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let cache = cache_in(&temp);
        cache.initialize(false).unwrap();
        cache.refresh_sync().unwrap();

        cache.initialize(true).unwrap();
        assert_eq!(cache.font_status(), CacheStatus::Ok);
        cache.shutdown();
    }
}
