use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the relay, without the `/api/openai` route.
    pub relay_url: String,
    /// Key-value store holding the saved rows. Defaults to `storage.db` in the config dir.
    pub storage_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            storage_path: None,
        }
    }
}

impl Settings {
    fn file_path() -> Option<PathBuf> {
        super::config_dir().map(|p| p.join("settings.yaml"))
    }

    /// Load `~/.config/openai-balance/settings.yaml`, falling back to defaults.
    pub fn load() -> Self {
        match Self::file_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_yml::from_str(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ignoring malformed settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage_path
            .clone()
            .or_else(|| super::config_dir().map(|p| p.join("storage.db")))
    }
}
