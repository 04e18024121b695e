use std::path::Path;

use super::{has_extension, read_children, WalkSummary, ANIMATION_EXTENSIONS};
use crate::error::Result;
use crate::store::Staging;
use crate::types::AnimationEntry;

/// Built-in animation sources, listed ahead of the files on disk.
pub const SPECIAL_ANIMATIONS: [&str; 3] = ["__logo__", "__cpu__", "__mem__"];

/// Stages the built-in sources followed by the image files directly inside
/// `root`. Subfolders are ignored.
pub fn collect_animations(
    root: &Path,
    staging: &mut Staging<'_, AnimationEntry>,
) -> Result<WalkSummary> {
    for name in SPECIAL_ANIMATIONS {
        if !staging.try_push(AnimationEntry::special(name))? {
            return Ok(WalkSummary::truncated(staging.len()));
        }
    }

    let children = match read_children(root) {
        Ok(children) => children,
        Err(error) => {
            log::warn!(
                "failed to list animation folder {}: {}",
                root.display(),
                error
            );
            return Ok(WalkSummary::complete(staging.len()));
        }
    };

    for child in children {
        if child.is_dir || !has_extension(&child.name, ANIMATION_EXTENSIONS) {
            continue;
        }
        if staging.is_full() {
            log::warn!(
                "animation cache capacity limit reached ({} animations), skipping: {}",
                staging.max_entries(),
                child.name
            );
            return Ok(WalkSummary::truncated(staging.len()));
        }
        staging.try_push(AnimationEntry::file(child.name, child.path))?;
    }

    Ok(WalkSummary::complete(staging.len()))
}
