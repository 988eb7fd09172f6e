//! Platform-specific locations for the vault database and configuration

use std::path::PathBuf;

const APP_DIR: &str = "keepsafe";

/// Get the platform-specific data directory
///
/// Returns:
/// - Windows: %LOCALAPPDATA%\keepsafe
/// - macOS: ~/Library/Application Support/keepsafe
/// - Linux/Other: ~/.local/share/keepsafe
pub fn get_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".data")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

/// Get the platform-specific config directory
pub fn get_config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

/// Get the default vault database path
pub fn get_default_database_path() -> PathBuf {
    get_data_dir().join("keepsafe.db")
}

/// Get the default configuration file path
pub fn get_default_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let db = get_default_database_path();
        assert!(db.ends_with("keepsafe/keepsafe.db"));
        assert!(db.starts_with(get_data_dir()));

        let config = get_default_config_path();
        assert!(config.ends_with("keepsafe/config.toml"));
    }
}
