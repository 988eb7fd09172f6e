//! Configuration for the admin tools.

use crate::platform::{get_default_config_path, get_default_database_path};
use crate::{KeepsafeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepsafeConfig {
    /// SQLite database holding users, categories and entries.
    pub database_path: PathBuf,
    /// Default `tracing` filter directive, overridden by `RUST_LOG`.
    pub log_level: String,
}

impl Default for KeepsafeConfig {
    fn default() -> Self {
        Self {
            database_path: get_default_database_path(),
            log_level: "warn".to_string(),
        }
    }
}

impl KeepsafeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| KeepsafeError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load `path` if given, else the default config file if it exists,
    /// else the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn default_path() -> PathBuf {
        get_default_config_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database_path = \"/var/lib/keepsafe/vault.db\"\nlog_level = \"debug\""
        )
        .unwrap();

        let config = KeepsafeConfig::load(file.path()).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/keepsafe/vault.db"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"info\"").unwrap();

        let config = KeepsafeConfig::load(file.path()).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.database_path, get_default_database_path());
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = ").unwrap();
        assert!(matches!(
            KeepsafeConfig::load(file.path()),
            Err(KeepsafeError::Config(_))
        ));
    }

    #[test]
    fn test_load_or_default_explicit_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            KeepsafeConfig::load_or_default(Some(&missing)),
            Err(KeepsafeError::Io(_))
        ));
    }
}
