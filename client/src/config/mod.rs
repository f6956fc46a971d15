pub mod settings;

use std::path::PathBuf;

/// Shared config directory: ~/.config/openai-balance/
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".config").join("openai-balance"))
}
