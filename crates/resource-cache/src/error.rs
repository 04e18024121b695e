use std::path::PathBuf;

use crate::types::ResourceKind;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to resolve {kind} folder from config path {}", config_path.display())]
    PathResolution {
        kind: ResourceKind,
        config_path: PathBuf,
    },

    #[error("{kind} folder does not exist: {}", path.display())]
    FolderMissing { kind: ResourceKind, path: PathBuf },

    #[error("failed to grow {kind} cache to {requested} entries")]
    Allocation { kind: ResourceKind, requested: usize },

    #[error("failed to spawn {name} thread: {source}")]
    ThreadSpawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("no resource folders could be watched")]
    NoWatchableFolders,

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("resource cache is not initialized")]
    NotInitialized,
}

pub type Result<T> = std::result::Result<T, CacheError>;
