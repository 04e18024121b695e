//! Resolution of the resource folders.
//!
//! Resources live in a `resources` folder next to the application's
//! configuration file:
//!
//! ```text
//! <config dir>/config.ini
//! <config dir>/resources/fonts/        (walked recursively)
//! <config dir>/resources/animations/   (flat)
//! ```

use std::path::{Path, PathBuf};

use crate::error::{CacheError, Result};
use crate::types::ResourceKind;

pub const RESOURCES_DIR: &str = "resources";
pub const FONTS_DIR: &str = "fonts";
pub const ANIMATIONS_DIR: &str = "animations";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocator {
    /// Folders derived from the configuration file location.
    ConfigRelative(PathBuf),
    /// Folders given directly.
    Explicit { fonts: PathBuf, animations: PathBuf },
}

impl ResourceLocator {
    pub fn from_config_file(config_path: impl Into<PathBuf>) -> Self {
        Self::ConfigRelative(config_path.into())
    }

    pub fn explicit(fonts: impl Into<PathBuf>, animations: impl Into<PathBuf>) -> Self {
        Self::Explicit {
            fonts: fonts.into(),
            animations: animations.into(),
        }
    }

    /// Returns the root folder for `kind`. The folder is not required to exist.
    pub fn root(&self, kind: ResourceKind) -> Result<PathBuf> {
        match self {
            Self::ConfigRelative(config_path) => {
                let config_dir = config_path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .ok_or_else(|| CacheError::PathResolution {
                        kind,
                        config_path: config_path.clone(),
                    })?;
                Ok(config_dir.join(RESOURCES_DIR).join(kind_dir(kind)))
            }
            Self::Explicit { fonts, animations } => Ok(match kind {
                ResourceKind::Fonts => fonts.clone(),
                ResourceKind::Animations => animations.clone(),
            }),
        }
    }
}

fn kind_dir(kind: ResourceKind) -> &'static Path {
    Path::new(match kind {
        ResourceKind::Fonts => FONTS_DIR,
        ResourceKind::Animations => ANIMATIONS_DIR,
    })
}

/// Resolves the root for `kind` and checks that it is a directory.
pub fn existing_root(locator: &ResourceLocator, kind: ResourceKind) -> Result<PathBuf> {
    let root = locator.root(kind)?;
    if !root.is_dir() {
        return Err(CacheError::FolderMissing { kind, path: root });
    }
    Ok(root)
}
