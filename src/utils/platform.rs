//! Platform-specific paths for audio-resolver
//!
//! Only the configuration location is platform dependent; the service keeps
//! no other files.

use std::path::PathBuf;

const APP_DIR: &str = "audio-resolver";
const CONFIG_FILE: &str = "config.toml";

/// Returns the configuration directory
/// - macOS: ~/Library/Application Support/audio-resolver
/// - Windows: %APPDATA%\audio-resolver
/// - Linux: ~/.config/audio-resolver
pub fn config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    #[cfg(not(target_os = "macos"))]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

/// Returns the per-user config file path (may not exist)
pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}
