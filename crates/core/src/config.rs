//! Application Configuration
//!
//! Manages shell settings:
//! - adb and fastboot locations
//! - Mode monitor polling
//! - Transfer and module download defaults

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, ShellError};
use folkadb_device_bridge::DEFAULT_REMOTE_DIR;

/// Tool location overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    /// Path to the adb executable
    pub adb_path: Option<PathBuf>,
    /// Path to the fastboot executable
    pub fastboot_path: Option<PathBuf>,
}

/// Mode monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Run the background monitor
    pub enabled: bool,
    /// Seconds between refreshes
    pub poll_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 3,
        }
    }
}

/// File transfer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransferConfig {
    /// Remote directory used by `push` without a destination
    pub default_remote_dir: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            default_remote_dir: DEFAULT_REMOTE_DIR.to_string(),
        }
    }
}

/// Root module installer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModulesConfig {
    /// Where downloaded modules are stored
    pub download_dir: Option<PathBuf>,
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub tools: ToolsConfig,
    pub monitor: MonitorConfig,
    pub transfer: TransferConfig,
    pub modules: ModulesConfig,
}

impl AppConfig {
    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("org", "folkadb", "folkadb")
    }

    /// Get the configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Load configuration from the default location
    pub async fn load() -> Result<Self> {
        let config_file = Self::config_file()
            .ok_or_else(|| ShellError::Config("Cannot determine config path".into()))?;
        Self::load_from(&config_file).await
    }

    /// Load configuration from a file, writing defaults when it does not exist
    pub async fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            debug!("Loading config from {:?}", path);
            let contents = tokio::fs::read_to_string(path).await?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("Config file not found, using defaults");
            let config = AppConfig::default();
            config.save_to(path).await?;
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    /// Directory for downloaded modules
    pub fn download_dir(&self) -> PathBuf {
        self.modules
            .download_dir
            .clone()
            .or_else(|| Self::data_dir().map(|dir| dir.join("downloads")))
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.monitor.enabled);
        assert_eq!(config.monitor.poll_interval_secs, 3);
        assert_eq!(config.transfer.default_remote_dir, "/storage/emulated/0/");
        assert_eq!(config.tools.adb_path, None);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            "[tools]\nadb_path = \"/opt/adb\"\n\n[monitor]\npoll_interval_secs = 5\n",
        )
        .unwrap();

        assert_eq!(config.tools.adb_path, Some(PathBuf::from("/opt/adb")));
        assert_eq!(config.monitor.poll_interval_secs, 5);
        assert!(config.monitor.enabled);
        assert_eq!(config.transfer, TransferConfig::default());
    }

    #[tokio::test]
    async fn test_first_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let reloaded = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "monitor = 7").unwrap();

        let err = AppConfig::load_from(&path).await.unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_download_dir_override() {
        let mut config = AppConfig::default();
        config.modules.download_dir = Some(PathBuf::from("/tmp/mods"));
        assert_eq!(config.download_dir(), PathBuf::from("/tmp/mods"));
    }
}
