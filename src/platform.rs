//! Cross-platform path resolution.
//!
//! Falls back to the working directory when the platform directories cannot
//! be determined (e.g. a sandboxed native messaging host without `$HOME`).

use std::path::PathBuf;

const APP_DIR: &str = "phishscan";

/// Returns the configuration directory.
///
/// Platform-specific locations:
/// - Linux: `~/.config/phishscan/`
/// - macOS: `~/Library/Application Support/phishscan/`
/// - Windows: `%APPDATA%\phishscan\`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Returns the directory holding persisted extension state.
///
/// Platform-specific locations:
/// - Linux: `~/.local/share/phishscan/`
/// - macOS: `~/Library/Application Support/phishscan/`
/// - Windows: `%APPDATA%\phishscan\`
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Path of the persisted state document.
pub fn state_file() -> PathBuf {
    data_dir().join("state.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_namespaced() {
        assert!(config_dir().ends_with(APP_DIR));
        assert!(state_file().ends_with("phishscan/state.json"));
    }
}
