//! Lifecycle and refresh behavior of `ResourceCache` driven by scripted scanners.

use std::fs::{self, File};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use resource_cache::{
    AnimationEntry, CacheSettings, CacheStatus, CacheStore, FontEntry, ResourceCache,
    ResourceLocator, Result, Scanner, SharedSelection, ShutdownOutcome,
};
use tempfile::TempDir;

/// Counts scans and optionally blocks inside the font scan.
#[derive(Default)]
struct SpyScanner {
    font_scans: AtomicUsize,
    animation_scans: AtomicUsize,
    entered: AtomicBool,
    gated: AtomicBool,
    scan_delay_ms: AtomicUsize,
}

impl SpyScanner {
    fn gated() -> Self {
        let scanner = Self::default();
        scanner.gated.store(true, Ordering::SeqCst);
        scanner
    }

    fn with_delay(ms: usize) -> Self {
        let scanner = Self::default();
        scanner.scan_delay_ms.store(ms, Ordering::SeqCst);
        scanner
    }

    fn release(&self) {
        self.gated.store(false, Ordering::SeqCst);
    }
}

impl Scanner for SpyScanner {
    fn scan_fonts(&self, store: &CacheStore<FontEntry>) -> Result<usize> {
        let mut state = store.write();
        self.entered.store(true, Ordering::SeqCst);
        while self.gated.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }
        let delay = self.scan_delay_ms.load(Ordering::SeqCst) as u64;
        thread::sleep(Duration::from_millis(delay));
        self.font_scans.fetch_add(1, Ordering::SeqCst);
        state.commit(Vec::new(), None)
    }

    fn scan_animations(&self, store: &CacheStore<AnimationEntry>) -> Result<usize> {
        let mut state = store.write();
        self.animation_scans.fetch_add(1, Ordering::SeqCst);
        state.commit(vec![AnimationEntry::special("__logo__")], None)
    }
}

fn settings() -> CacheSettings {
    CacheSettings {
        worker_start_delay_ms: 0,
        watcher_enabled: false,
        shutdown_timeout_ms: 2_000,
        ..CacheSettings::default()
    }
}

fn cache_with(scanner: Arc<SpyScanner>, settings: CacheSettings) -> ResourceCache {
    ResourceCache::with_scanner(
        ResourceLocator::explicit("/nonexistent/fonts", "/nonexistent/animations"),
        settings,
        scanner,
    )
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn initial_scan_populates_both_stores() {
    let scanner = Arc::new(SpyScanner::default());
    let cache = cache_with(scanner.clone(), settings());

    cache.initialize(true).unwrap();
    assert!(wait_until(|| cache.is_background_scan_complete()));
    assert_eq!(cache.font_status(), CacheStatus::Empty);
    assert_eq!(cache.animation_status(), CacheStatus::Ok);
    assert_eq!(scanner.font_scans.load(Ordering::SeqCst), 1);
    assert_eq!(cache.shutdown(), ShutdownOutcome::Graceful);
}

#[test]
fn concurrent_refresh_requests_run_one_scan() {
    let scanner = Arc::new(SpyScanner::with_delay(300));
    let cache = cache_with(scanner.clone(), settings());
    cache.initialize(true).unwrap();
    assert!(wait_until(|| cache.is_background_scan_complete()
        && !cache.is_refresh_in_progress()));

    let callers = 8;
    let barrier = Arc::new(Barrier::new(callers));
    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                cache.request_refresh();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.animation_status(), CacheStatus::Invalid);
    assert!(wait_until(|| !cache.is_refresh_in_progress()));
    assert_eq!(scanner.font_scans.load(Ordering::SeqCst), 2);
    assert_eq!(scanner.animation_scans.load(Ordering::SeqCst), 2);
    assert_eq!(cache.animation_status(), CacheStatus::Ok);
    cache.shutdown();
}

#[test]
fn refresh_after_completion_scans_again() {
    let scanner = Arc::new(SpyScanner::default());
    let cache = cache_with(scanner.clone(), settings());
    cache.initialize(true).unwrap();
    assert!(wait_until(|| !cache.is_refresh_in_progress()));
    assert_eq!(scanner.animation_scans.load(Ordering::SeqCst), 1);

    cache.request_refresh();
    assert!(wait_until(|| !cache.is_refresh_in_progress()));
    cache.request_refresh();
    assert!(wait_until(|| !cache.is_refresh_in_progress()));
    assert_eq!(scanner.animation_scans.load(Ordering::SeqCst), 3);
    cache.shutdown();
}

#[test]
fn stuck_worker_is_abandoned_and_cache_can_restart() {
    let scanner = Arc::new(SpyScanner::gated());
    let cache = cache_with(
        scanner.clone(),
        CacheSettings {
            shutdown_timeout_ms: 100,
            ..settings()
        },
    );
    cache.initialize(true).unwrap();
    assert!(wait_until(|| scanner.entered.load(Ordering::SeqCst)));

    let started = Instant::now();
    assert_eq!(cache.shutdown(), ShutdownOutcome::Abandoned);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!cache.is_ready());
    assert_eq!(cache.font_status(), CacheStatus::Error);

    cache.initialize(false).unwrap();
    assert!(cache.is_ready());
    assert_eq!(cache.font_status(), CacheStatus::Invalid);

    scanner.release();
    assert!(wait_until(|| scanner.font_scans.load(Ordering::SeqCst) == 1));
    assert_eq!(cache.font_status(), CacheStatus::Invalid);
    assert_eq!(scanner.animation_scans.load(Ordering::SeqCst), 0);
    assert_eq!(cache.shutdown(), ShutdownOutcome::Graceful);
}

#[test]
fn shutdown_during_start_delay_skips_the_scan() {
    let scanner = Arc::new(SpyScanner::default());
    let cache = cache_with(
        scanner.clone(),
        CacheSettings {
            worker_start_delay_ms: 10_000,
            ..settings()
        },
    );
    cache.initialize(true).unwrap();

    assert_eq!(cache.shutdown(), ShutdownOutcome::Graceful);
    assert_eq!(scanner.font_scans.load(Ordering::SeqCst), 0);
    assert!(!cache.is_background_scan_complete());
}

#[test]
fn shutdown_is_idempotent() {
    let cache = cache_with(Arc::new(SpyScanner::default()), settings());
    assert_eq!(cache.shutdown(), ShutdownOutcome::NotInitialized);

    cache.initialize(false).unwrap();
    assert_eq!(cache.shutdown(), ShutdownOutcome::Graceful);
    assert_eq!(cache.shutdown(), ShutdownOutcome::NotInitialized);

    cache.initialize(false).unwrap();
    assert!(cache.is_ready());
    assert_eq!(cache.shutdown(), ShutdownOutcome::Graceful);
}

#[test]
fn refresh_before_initialize_is_ignored() {
    let scanner = Arc::new(SpyScanner::default());
    let cache = cache_with(scanner.clone(), settings());

    cache.request_refresh();
    cache.invalidate_all();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(scanner.font_scans.load(Ordering::SeqCst), 0);
    assert_eq!(cache.animation_status(), CacheStatus::Error);
}

#[test]
fn populated_store_expires_after_ttl() {
    let temp = TempDir::new().unwrap();
    let fonts = temp.path().join("resources/fonts");
    fs::create_dir_all(&fonts).unwrap();
    fs::create_dir_all(temp.path().join("resources/animations")).unwrap();
    File::create(fonts.join("a.ttf")).unwrap();

    let cache = ResourceCache::new(
        ResourceLocator::from_config_file(temp.path().join("config.ini")),
        CacheSettings {
            ttl_secs: 1,
            ..settings()
        },
        Arc::new(SharedSelection::new()),
    );
    cache.initialize(false).unwrap();
    cache.refresh_sync().unwrap();
    assert_eq!(cache.font_status(), CacheStatus::Ok);

    thread::sleep(Duration::from_millis(1_500));
    let snapshot = cache.fonts();
    assert_eq!(snapshot.status, CacheStatus::Expired);
    assert_eq!(snapshot.len(), 1);
    cache.shutdown();
}

#[test]
fn watcher_refreshes_after_new_font() {
    let temp = TempDir::new().unwrap();
    let fonts = temp.path().join("resources/fonts");
    fs::create_dir_all(&fonts).unwrap();
    fs::create_dir_all(temp.path().join("resources/animations")).unwrap();
    File::create(fonts.join("a.ttf")).unwrap();

    let cache = ResourceCache::new(
        ResourceLocator::from_config_file(temp.path().join("config.ini")),
        CacheSettings {
            watcher_enabled: true,
            watcher_grace_ms: 0,
            watcher_poll_ms: 20,
            ..settings()
        },
        Arc::new(SharedSelection::new()),
    );
    cache.initialize(true).unwrap();
    assert!(cache.is_watcher_active());
    assert!(wait_until(|| cache.is_background_scan_complete()
        && !cache.is_refresh_in_progress()));
    assert_eq!(cache.statistics().fonts.count, 1);

    File::create(fonts.join("b.otf")).unwrap();
    assert!(wait_until(|| cache.statistics().fonts.count == 2
        && cache.font_status() == CacheStatus::Ok));

    assert_eq!(cache.shutdown(), ShutdownOutcome::Graceful);
    assert!(!cache.is_watcher_active());
}

#[test]
fn refresh_while_reading_fonts_does_not_deadlock() {
    let cache = cache_with(Arc::new(SpyScanner::default()), settings());
    cache.initialize(true).unwrap();
    assert!(wait_until(|| cache.is_background_scan_complete()
        && !cache.is_refresh_in_progress()));

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let reader = cache.clone();
    thread::spawn(move || {
        let ready = reader.with_fonts(|_, _| {
            thread::sleep(Duration::from_millis(200));
            reader.is_ready()
        });
        let _ = done_tx.send(ready);
    });

    thread::sleep(Duration::from_millis(50));
    let refresher = cache.clone();
    let refresh = thread::spawn(move || refresher.request_refresh());

    assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)), Ok(true));
    refresh.join().unwrap();
    assert!(wait_until(|| !cache.is_refresh_in_progress()));
    assert_eq!(cache.shutdown(), ShutdownOutcome::Graceful);
}

#[test]
fn unwatchable_folders_do_not_block_initialize() {
    let cache = cache_with(
        Arc::new(SpyScanner::default()),
        CacheSettings {
            watcher_enabled: true,
            ..settings()
        },
    );

    cache.initialize(true).unwrap();
    assert!(cache.is_ready());
    assert!(!cache.is_watcher_active());
    assert!(wait_until(|| cache.is_background_scan_complete()));
    assert_eq!(cache.shutdown(), ShutdownOutcome::Graceful);
}
