//! Access to the user's current font and animation choice.
//!
//! The selection lives in application configuration owned elsewhere; scans
//! read it through [`SelectionSource`] to flag the current entry.

use parking_lot::RwLock;

/// Segment that precedes font paths as stored in the configuration file.
pub const FONTS_CONFIG_PREFIX: &str = "resources/fonts/";

pub trait SelectionSource: Send + Sync {
    /// The current font, relative to the font root.
    fn current_font(&self) -> Option<String>;

    /// The current animation's file name, or a built-in source name.
    fn current_animation(&self) -> Option<String>;
}

/// A selection that never names anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSelection;

impl SelectionSource for NoSelection {
    fn current_font(&self) -> Option<String> {
        None
    }

    fn current_animation(&self) -> Option<String> {
        None
    }
}

/// In-memory selection updated by the host application.
#[derive(Debug, Default)]
pub struct SharedSelection {
    font: RwLock<Option<String>>,
    animation: RwLock<Option<String>>,
}

impl SharedSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_font(&self, relative_path: Option<String>) {
        *self.font.write() = relative_path;
    }

    /// Stores a font given in configuration form, e.g.
    /// `C:\Users\me\App\resources\fonts\sub\c.ttf`. Values outside the font
    /// folder clear the selection.
    pub fn set_font_from_config(&self, value: &str) {
        self.set_font(font_relative_from_config(value));
    }

    pub fn set_animation(&self, name: Option<String>) {
        *self.animation.write() = name;
    }
}

impl SelectionSource for SharedSelection {
    fn current_font(&self) -> Option<String> {
        self.font.read().clone()
    }

    fn current_animation(&self) -> Option<String> {
        self.animation.read().clone()
    }
}

/// Extracts the font-root-relative part of a configured font path.
pub fn font_relative_from_config(value: &str) -> Option<String> {
    let normalized = value.replace('\\', "/");
    let lowered = normalized.to_ascii_lowercase();
    let start = if lowered.starts_with(FONTS_CONFIG_PREFIX) {
        0
    } else {
        lowered.find(&format!("/{FONTS_CONFIG_PREFIX}"))? + 1
    };
    let relative = &normalized[start + FONTS_CONFIG_PREFIX.len()..];
    if relative.is_empty() {
        None
    } else {
        Some(relative.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_case_insensitively() {
        assert_eq!(
            font_relative_from_config("Resources\\Fonts\\sub\\c.ttf").as_deref(),
            Some("sub/c.ttf")
        );
        assert_eq!(
            font_relative_from_config("C:\\Users\\me\\App\\resources\\fonts\\a.ttf").as_deref(),
            Some("a.ttf")
        );
    }

    #[test]
    fn values_outside_font_folder_are_ignored() {
        assert_eq!(font_relative_from_config("C:\\Windows\\Fonts\\arial.ttf"), None);
        assert_eq!(font_relative_from_config("myresources/fonts/a.ttf"), None);
        assert_eq!(font_relative_from_config("resources/fonts/"), None);
    }

    #[test]
    fn shared_selection_round_trips_through_trait() {
        let selection = SharedSelection::new();
        selection.set_font_from_config("resources/fonts/sub/c.ttf");
        selection.set_animation(Some("__cpu__".to_string()));

        let source: &dyn SelectionSource = &selection;
        assert_eq!(source.current_font().as_deref(), Some("sub/c.ttf"));
        assert_eq!(source.current_animation().as_deref(), Some("__cpu__"));
    }
}
