//! Entry and status types handed out by the resource caches.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// The two families of resources kept in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Fonts,
    Animations,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fonts => "fonts",
            Self::Animations => "animations",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshness of a cache store as seen by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Populated and younger than the TTL.
    Ok,
    /// Populated but older than the TTL. Entries are still served.
    Expired,
    /// A scan completed and found nothing.
    Empty,
    /// No completed scan since startup or the last invalidation.
    Invalid,
    /// The cache subsystem is not initialized.
    Error,
}

impl CacheStatus {
    /// Whether readers receive entries in this state.
    pub fn is_readable(self) -> bool {
        matches!(self, Self::Ok | Self::Expired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Expired => "expired",
            Self::Empty => "empty",
            Self::Invalid => "invalid",
            Self::Error => "error",
        }
    }
}

/// Behaviour shared by both entry kinds so a single store implementation
/// can maintain the "current" marker.
pub trait CacheEntry: Clone + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn is_current(&self) -> bool;

    fn set_current(&mut self, current: bool);

    /// Whether this entry is the one a selection identifier refers to.
    fn matches_selection(&self, identifier: &str) -> bool;
}

/// A typeface file discovered under the font root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontEntry {
    pub file_name: String,
    pub full_path: PathBuf,
    /// File name without its last extension.
    pub display_name: String,
    /// Path relative to the font root, `/`-separated.
    pub relative_path: String,
    /// Number of folders between the font root and the file.
    pub depth: usize,
    pub is_current: bool,
}

impl FontEntry {
    pub fn new(file_name: String, full_path: PathBuf, relative_path: String, depth: usize) -> Self {
        let display_name = match file_name.rfind('.') {
            Some(dot) => file_name[..dot].to_string(),
            None => file_name.clone(),
        };
        Self {
            file_name,
            full_path,
            display_name,
            relative_path,
            depth,
            is_current: false,
        }
    }
}

impl CacheEntry for FontEntry {
    const KIND: ResourceKind = ResourceKind::Fonts;

    fn is_current(&self) -> bool {
        self.is_current
    }

    fn set_current(&mut self, current: bool) {
        self.is_current = current;
    }

    fn matches_selection(&self, identifier: &str) -> bool {
        relative_paths_match(&self.relative_path, identifier)
    }
}

/// An animation source: either a file in the animation root or one of the
/// built-in indicator sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationEntry {
    pub file_name: String,
    pub relative_path: String,
    /// Empty for built-in sources.
    pub full_path: PathBuf,
    pub is_special: bool,
    pub is_current: bool,
}

impl AnimationEntry {
    pub fn file(file_name: String, full_path: PathBuf) -> Self {
        Self {
            relative_path: file_name.clone(),
            file_name,
            full_path,
            is_special: false,
            is_current: false,
        }
    }

    pub fn special(name: &str) -> Self {
        Self {
            file_name: name.to_string(),
            relative_path: name.to_string(),
            full_path: PathBuf::new(),
            is_special: true,
            is_current: false,
        }
    }
}

impl CacheEntry for AnimationEntry {
    const KIND: ResourceKind = ResourceKind::Animations;

    fn is_current(&self) -> bool {
        self.is_current
    }

    fn set_current(&mut self, current: bool) {
        self.is_current = current;
    }

    fn matches_selection(&self, identifier: &str) -> bool {
        self.file_name == identifier
    }
}

/// Case-insensitive relative path comparison that treats `\` and `/` alike.
pub fn relative_paths_match(a: &str, b: &str) -> bool {
    let normalize = |c: char| if c == '\\' { '/' } else { c };
    let mut left = a.chars().map(normalize).flat_map(char::to_lowercase);
    let mut right = b.chars().map(normalize).flat_map(char::to_lowercase);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if x == y => continue,
            _ => return false,
        }
    }
}

/// Status and entries copied out of a store in one read-locked section.
#[derive(Debug, Clone)]
pub struct CacheSnapshot<E> {
    pub status: CacheStatus,
    /// `Some` only when `status` is [`CacheStatus::Ok`] or [`CacheStatus::Expired`].
    pub entries: Option<Vec<E>>,
}

impl<E> CacheSnapshot<E> {
    pub fn unavailable(status: CacheStatus) -> Self {
        Self {
            status,
            entries: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Diagnostic counters for a single store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    pub count: usize,
    pub scan_time: Option<DateTime<Utc>>,
}

/// Diagnostic counters for both stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    pub fonts: StoreStatistics,
    pub animations: StoreStatistics,
}
