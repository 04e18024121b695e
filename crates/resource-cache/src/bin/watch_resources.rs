//! Runs the resource cache against a configuration file and logs statistics.
//!
//! Usage: `cargo run --bin watch_resources -- <config-file> [seconds]`
//!
//! Cache settings are read from `resource-cache.json` next to the config file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use resource_cache::settings::SETTINGS_FILENAME;
use resource_cache::{load_settings, CacheError, ResourceCache, ResourceLocator, SharedSelection};

const REPORT_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_RUN_SECS: u64 = 30;

fn main() -> resource_cache::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from).ok_or_else(|| {
        CacheError::Settings("usage: watch_resources <config-file> [seconds]".to_string())
    })?;
    let run_for = args
        .next()
        .and_then(|value| value.parse().ok())
        .map_or(Duration::from_secs(DEFAULT_RUN_SECS), Duration::from_secs);

    let settings_path = config_path
        .parent()
        .map(|dir| dir.join(SETTINGS_FILENAME))
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILENAME));
    let settings = load_settings(&settings_path)?;

    let cache = ResourceCache::new(
        ResourceLocator::from_config_file(&config_path),
        settings,
        Arc::new(SharedSelection::new()),
    );
    cache.initialize(true)?;

    let started = Instant::now();
    while started.elapsed() < run_for {
        std::thread::sleep(REPORT_INTERVAL);
        let stats = cache.statistics();
        log::info!(
            "fonts status={} count={} animations status={} count={} watcher={}",
            cache.font_status().as_str(),
            stats.fonts.count,
            cache.animation_status().as_str(),
            stats.animations.count,
            cache.is_watcher_active()
        );
    }

    let outcome = cache.shutdown();
    println!("Shutdown finished: {outcome:?}");
    Ok(())
}
