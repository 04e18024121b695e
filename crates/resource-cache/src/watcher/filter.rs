//! Classification of raw filesystem events.

use std::path::Path;

use bitflags::bitflags;
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::EventKind;

use crate::scan::{has_extension, ANIMATION_EXTENSIONS, FONT_EXTENSIONS};

bitflags! {
    /// Kinds of change the watcher reacts to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WatchFilter: u8 {
        const FILE_NAME = 0b001;
        const DIR_NAME = 0b010;
        const LAST_WRITE = 0b100;
    }
}

impl Default for WatchFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl WatchFilter {
    /// Maps a notify event kind onto the filter bits it falls under.
    pub fn from_event_kind(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => {
                Self::DIR_NAME
            }
            EventKind::Create(CreateKind::File) | EventKind::Remove(RemoveKind::File) => {
                Self::FILE_NAME
            }
            EventKind::Create(_) | EventKind::Remove(_) => Self::FILE_NAME | Self::DIR_NAME,
            EventKind::Modify(ModifyKind::Name(_)) => Self::FILE_NAME | Self::DIR_NAME,
            EventKind::Modify(ModifyKind::Data(_)) => Self::LAST_WRITE,
            EventKind::Modify(ModifyKind::Metadata(_)) => Self::LAST_WRITE,
            EventKind::Modify(_) => Self::FILE_NAME | Self::LAST_WRITE,
            EventKind::Any | EventKind::Other => Self::all(),
            EventKind::Access(_) => Self::empty(),
        }
    }

    pub fn accepts(self, kind: &EventKind) -> bool {
        self.intersects(Self::from_event_kind(kind))
    }
}

/// A changed path matters when it names a font, an animation, or something
/// without an extension (usually a folder).
pub fn is_relevant_path(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    if !name.contains('.') {
        return true;
    }
    has_extension(name, FONT_EXTENSIONS) || has_extension(name, ANIMATION_EXTENSIONS)
}
