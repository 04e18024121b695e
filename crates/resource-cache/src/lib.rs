//! Background-refreshed discovery cache for user fonts and animations.
//!
//! This crate keeps an in-memory view of two resource folders so UI code can
//! list them without touching the filesystem:
//! - Capacity-bounded stores with TTL-based staleness
//! - Depth-limited recursive font scanning and flat animation scanning
//! - Single-flight background refreshes with bounded shutdown
//! - Directory watching that requests a refresh on relevant changes

pub mod cache;
pub mod cancel;
pub mod error;
pub mod flight;
pub mod locator;
pub mod scan;
pub mod selection;
pub mod settings;
pub mod store;
pub mod types;
pub mod watcher;
pub mod worker;

// Re-export main types
pub use cache::{ResourceCache, ShutdownOutcome};
pub use cancel::CancellationToken;
pub use error::{CacheError, Result};
pub use locator::ResourceLocator;
pub use scan::{FsScanner, Scanner};
pub use selection::{font_relative_from_config, SelectionSource, SharedSelection};
pub use settings::{load_settings, CacheSettings};
pub use store::CacheStore;
pub use types::{
    AnimationEntry, CacheSnapshot, CacheStatistics, CacheStatus, FontEntry, ResourceKind,
    StoreStatistics,
};
pub use watcher::{RefreshTrigger, ResourceWatcher, WatchFilter};
