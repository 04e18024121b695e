//! Scanners that repopulate the cache stores from disk.
//!
//! - `fonts` walks the font root recursively with an explicit worklist
//! - `animations` lists the animation root flat, after the built-in sources
//!
//! Both hold the store's write lock for the whole scan and push into the
//! store's staging area, which stops accepting entries at the capacity
//! ceiling. The store is only stamped valid once the walk has finished; a
//! failed walk leaves the previous contents in place.

mod animations;
mod fonts;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use animations::{collect_animations, SPECIAL_ANIMATIONS};
pub use fonts::collect_fonts;

use crate::error::{CacheError, Result};
use crate::locator::{existing_root, ResourceLocator};
use crate::selection::SelectionSource;
use crate::store::CacheStore;
use crate::types::{AnimationEntry, FontEntry, ResourceKind};

pub const FONT_EXTENSIONS: &[&str] = &["ttf", "otf"];
pub const ANIMATION_EXTENSIONS: &[&str] = &["gif", "webp", "png", "jpg", "jpeg", "bmp"];

/// Repopulates cache stores. Implementations must take the store's write
/// lock for the duration of the scan.
pub trait Scanner: Send + Sync {
    fn scan_fonts(&self, store: &CacheStore<FontEntry>) -> Result<usize>;

    fn scan_animations(&self, store: &CacheStore<AnimationEntry>) -> Result<usize>;
}

/// The filesystem-backed scanner.
pub struct FsScanner {
    locator: ResourceLocator,
    selection: Arc<dyn SelectionSource>,
    max_depth: usize,
}

impl std::fmt::Debug for FsScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsScanner")
            .field("locator", &self.locator)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl FsScanner {
    pub fn new(
        locator: ResourceLocator,
        selection: Arc<dyn SelectionSource>,
        max_depth: usize,
    ) -> Self {
        Self {
            locator,
            selection,
            max_depth,
        }
    }

}

impl Scanner for FsScanner {
    fn scan_fonts(&self, store: &CacheStore<FontEntry>) -> Result<usize> {
        // A missing folder must leave the store untouched.
        let root = existing_root(&self.locator, ResourceKind::Fonts)?;

        let current = self.selection.current_font();
        let mut state = store.write();
        state.shrink_if_underused();
        let mut staging = state.stage();
        let walk = collect_fonts(&root, self.max_depth, &mut staging)?;
        let count = staging.commit(current.as_deref());

        log::info!(
            "font cache scan complete count={} truncated={} root={}",
            count,
            walk.truncated,
            root.display()
        );
        Ok(count)
    }

    fn scan_animations(&self, store: &CacheStore<AnimationEntry>) -> Result<usize> {
        let root = existing_root(&self.locator, ResourceKind::Animations)?;

        let current = self.selection.current_animation();
        let mut state = store.write();
        state.shrink_if_underused();
        let mut staging = state.stage();
        let walk = collect_animations(&root, &mut staging)?;
        let count = staging.commit(current.as_deref());

        log::info!(
            "animation cache scan complete count={} truncated={} root={}",
            count,
            walk.truncated,
            root.display()
        );
        Ok(count)
    }
}

/// Outcome of a walk into a store's staging area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub accepted: usize,
    /// The capacity ceiling was hit and later entries were skipped.
    pub truncated: bool,
}

impl WalkSummary {
    fn complete(accepted: usize) -> Self {
        Self {
            accepted,
            truncated: false,
        }
    }

    fn truncated(accepted: usize) -> Self {
        Self {
            accepted,
            truncated: true,
        }
    }
}

/// Logs a failed scan at the severity its cause deserves.
pub fn report_failure(kind: ResourceKind, error: &CacheError) {
    match error {
        CacheError::FolderMissing { .. } => log::warn!("{kind} scan skipped: {error}"),
        _ => log::error!("{kind} scan failed: {error}"),
    }
}

/// Case-insensitive extension test. Names without an extension never match.
pub fn has_extension(name: &str, extensions: &[&str]) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => extensions
            .iter()
            .any(|candidate| ext.eq_ignore_ascii_case(candidate)),
        None => false,
    }
}

/// A directory child as seen by the scanners.
#[derive(Debug)]
struct Child {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

/// Lists a directory sorted by name. Symlinked folders count as folders;
/// unreadable children are skipped.
fn read_children(dir: &Path) -> io::Result<Vec<Child>> {
    let mut children: Vec<Child> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let file_type = entry.file_type().ok()?;
            let path = entry.path();
            let is_dir = file_type.is_dir() || (file_type.is_symlink() && path.is_dir());
            Some(Child {
                name: entry.file_name().to_string_lossy().into_owned(),
                path,
                is_dir,
            })
        })
        .collect();
    children.sort_unstable_by(|a, b| a.name.cmp(&b.name));
    Ok(children)
}
