//! Recursive font discovery.
//!
//! The walk keeps its own worklist of `(path, relative path, depth)` instead
//! of recursing, so a pathological tree cannot exhaust the native stack. The
//! depth cap is the loop's guard against symlink cycles.

use std::path::{Path, PathBuf};

use super::{has_extension, read_children, WalkSummary, FONT_EXTENSIONS};
use crate::error::Result;
use crate::store::Staging;
use crate::types::FontEntry;

#[derive(Debug)]
struct PendingDir {
    path: PathBuf,
    relative: String,
    depth: usize,
}

/// Stages font files found under `root`.
///
/// Folders at `max_depth` or deeper are not listed. Children are visited in
/// name order, files of a folder before its subfolders. Fails only when the
/// staging area cannot grow.
pub fn collect_fonts(
    root: &Path,
    max_depth: usize,
    staging: &mut Staging<'_, FontEntry>,
) -> Result<WalkSummary> {
    let mut pending = vec![PendingDir {
        path: root.to_path_buf(),
        relative: String::new(),
        depth: 0,
    }];

    while let Some(dir) = pending.pop() {
        if dir.depth >= max_depth {
            log::warn!(
                "font scan depth limit reached depth={} path={}",
                dir.depth,
                dir.path.display()
            );
            continue;
        }

        let children = match read_children(&dir.path) {
            Ok(children) => children,
            Err(error) => {
                log::warn!(
                    "failed to scan font folder {}: {}",
                    dir.path.display(),
                    error
                );
                continue;
            }
        };

        let mut subdirs = Vec::new();
        for child in children {
            let relative = if dir.relative.is_empty() {
                child.name.clone()
            } else {
                format!("{}/{}", dir.relative, child.name)
            };

            if child.is_dir {
                subdirs.push(PendingDir {
                    path: child.path,
                    relative,
                    depth: dir.depth + 1,
                });
                continue;
            }

            if !has_extension(&child.name, FONT_EXTENSIONS) {
                continue;
            }

            if staging.is_full() {
                log::warn!(
                    "font cache capacity limit reached ({} fonts), skipping: {}",
                    staging.max_entries(),
                    child.name
                );
                return Ok(WalkSummary::truncated(staging.len()));
            }

            staging.try_push(FontEntry::new(child.name, child.path, relative, dir.depth))?;
        }

        pending.extend(subdirs.into_iter().rev());
    }

    Ok(WalkSummary::complete(staging.len()))
}
