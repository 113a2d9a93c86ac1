/// User preferences persisted in chrome.storage.sync

use serde::{Deserialize, Serialize};

use crate::thumbnail::ThumbnailConfig;

pub const SETTINGS_KEY: &str = "bookmark_deck_settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    #[default]
    Auto,
    Light,
    Dark,
}

impl Appearance {
    /// Whether the dark palette applies given the system preference
    pub fn is_dark(self, system_dark: bool) -> bool {
        match self {
            Appearance::Auto => system_dark,
            Appearance::Light => false,
            Appearance::Dark => true,
        }
    }

    /// Flip between explicit light and dark based on what is showing now
    pub fn toggled(self, system_dark: bool) -> Appearance {
        if self.is_dark(system_dark) {
            Appearance::Light
        } else {
            Appearance::Dark
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Appearance::Auto => "Auto",
            Appearance::Light => "Light",
            Appearance::Dark => "Dark",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Flat grid of every match, most recent first
    #[default]
    Grid,
    /// One section per folder
    Folder,
}

impl ViewMode {
    pub fn toggled(self) -> ViewMode {
        match self {
            ViewMode::Grid => ViewMode::Folder,
            ViewMode::Folder => ViewMode::Grid,
        }
    }
}

/// Root settings structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub appearance: Appearance,
    pub view_mode: ViewMode,
    pub thumbnails: ThumbnailConfig,
}

impl Settings {
    pub fn new() -> Self {
        Settings::default()
    }

    /// Parse stored JSON, falling back to defaults when it is missing or corrupt
    pub fn from_json(json: Option<&str>) -> Settings {
        match json {
            None => Settings::new(),
            Some(json) => serde_json::from_str(json).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable settings: {}", e);
                Settings::new()
            }),
        }
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| format!("Failed to serialize settings: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_new() {
        let settings = Settings::new();
        assert_eq!(settings.appearance, Appearance::Auto);
        assert_eq!(settings.view_mode, ViewMode::Grid);
        assert_eq!(settings.thumbnails.width, 1024);
    }

    #[test]
    fn test_appearance_resolution() {
        assert!(Appearance::Auto.is_dark(true));
        assert!(!Appearance::Auto.is_dark(false));
        assert!(Appearance::Dark.is_dark(false));
        assert!(!Appearance::Light.is_dark(true));
    }

    #[test]
    fn test_appearance_toggle() {
        assert_eq!(Appearance::Auto.toggled(true), Appearance::Light);
        assert_eq!(Appearance::Auto.toggled(false), Appearance::Dark);
        assert_eq!(Appearance::Dark.toggled(false), Appearance::Light);
    }

    #[test]
    fn test_view_mode_toggle() {
        assert_eq!(ViewMode::Grid.toggled(), ViewMode::Folder);
        assert_eq!(ViewMode::Folder.toggled(), ViewMode::Grid);
    }

    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings = Settings::from_json(Some(r#"{"appearance":"dark"}"#));
        assert_eq!(settings.appearance, Appearance::Dark);
        assert_eq!(settings.view_mode, ViewMode::Grid);
        assert_eq!(settings.thumbnails.settle_delay_ms, 1000);
    }

    #[test]
    fn test_corrupt_settings_fall_back() {
        assert_eq!(Settings::from_json(Some("{not json")), Settings::new());
        assert_eq!(Settings::from_json(None), Settings::new());
    }

    #[test]
    fn test_serialization() {
        let mut settings = Settings::new();
        settings.view_mode = ViewMode::Folder;
        settings.thumbnails.load_timeout_ms = None;

        let json = settings.to_json().unwrap();
        assert_eq!(Settings::from_json(Some(&json)), settings);
    }
}
