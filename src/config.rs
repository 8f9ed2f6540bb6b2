//! Client configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};

/// File name looked up in the working directory and in `~/.hiveforge/`.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Connection settings for the hiveforge API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API host name or address.
    pub api_endpoint: String,
    /// API port.
    pub port: u16,
    /// Extra CA certificate (PEM) to trust.
    #[serde(default)]
    pub cacert_file: Option<PathBuf>,
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,
}

impl ClientConfig {
    /// Locations searched by [`ClientConfig::load`], in order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".hiveforge").join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Load the first config file found in [`ClientConfig::search_paths`].
    pub fn load() -> Result<Self> {
        let paths = Self::search_paths();
        let path = paths.iter().find(|p| p.is_file()).ok_or_else(|| {
            eyre!("Config file not found in current directory or ~/.hiveforge/")
        })?;
        Self::from_file(path)
    }

    /// Load a config file from an explicit path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&data)
            .wrap_err_with(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Base URL of the API, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.api_endpoint, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_file_with_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"api_endpoint": "hive.local", "port": 8080}"#).unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.api_endpoint, "hive.local");
        assert_eq!(config.port, 8080);
        assert!(config.cacert_file.is_none());
        assert!(!config.debug);
        assert_eq!(config.base_url(), "http://hive.local:8080");
    }

    #[test]
    fn test_from_file_rejects_bad_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        let err = ClientConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_search_paths_start_in_working_directory() {
        let paths = ClientConfig::search_paths();
        assert_eq!(paths[0], PathBuf::from("config.json"));
    }
}
