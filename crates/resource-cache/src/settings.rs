//! Tunables for the resource cache.
//!
//! Settings are read from an optional JSON file. A missing file yields the
//! defaults and missing fields fall back to their default values.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

pub const SETTINGS_FILENAME: &str = "resource-cache.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Hard cap on entries per store.
    pub max_entries: usize,
    /// Age after which a populated store reports `Expired`.
    pub ttl_secs: u64,
    /// Folder nesting limit for the recursive font walk.
    pub max_scan_depth: usize,
    /// Pause before a background scan starts, letting the UI settle.
    pub worker_start_delay_ms: u64,
    /// Bounded wait for the scan worker during shutdown.
    pub shutdown_timeout_ms: u64,
    pub watcher_enabled: bool,
    /// Delay before the watcher starts handling changes.
    pub watcher_grace_ms: u64,
    /// How often the watcher thread polls its stop flag.
    pub watcher_poll_ms: u64,
    pub watcher_stop_timeout_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 200,
            ttl_secs: 60,
            max_scan_depth: 10,
            worker_start_delay_ms: 100,
            shutdown_timeout_ms: 5_000,
            watcher_enabled: true,
            watcher_grace_ms: 500,
            watcher_poll_ms: 1_000,
            watcher_stop_timeout_ms: 3_000,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn worker_start_delay(&self) -> Duration {
        Duration::from_millis(self.worker_start_delay_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn watcher_grace(&self) -> Duration {
        Duration::from_millis(self.watcher_grace_ms)
    }

    pub fn watcher_poll_interval(&self) -> Duration {
        Duration::from_millis(self.watcher_poll_ms.max(1))
    }

    pub fn watcher_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.watcher_stop_timeout_ms)
    }
}

/// Loads settings from `path`, returning defaults when the file is absent.
pub fn load_settings(path: &Path) -> Result<CacheSettings> {
    if !path.exists() {
        return Ok(CacheSettings::default());
    }

    let data = std::fs::read_to_string(path).map_err(|error| {
        CacheError::Settings(format!(
            "failed to read cache settings {}: {error}",
            path.display()
        ))
    })?;
    let settings: CacheSettings = serde_json::from_str(&data).map_err(|error| {
        CacheError::Settings(format!(
            "failed to parse cache settings {}: {error}",
            path.display()
        ))
    })?;

    if settings.max_entries == 0 {
        return Err(CacheError::Settings(format!(
            "max_entries must be positive in {}",
            path.display()
        )));
    }
    Ok(settings)
}
