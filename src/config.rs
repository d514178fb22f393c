//! On-disk configuration
//!
//! A small YAML configuration file, loaded at startup. A missing file means
//! defaults; unknown or partial files fall back field by field via serde
//! defaults.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file location
pub const CONFIG_FILE: &str = "config/warden.yaml";

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Directory holding the store files
    pub data_dir: PathBuf,
    /// Seconds between expiry sweep ticks
    pub sweep_interval_seconds: u64,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            sweep_interval_seconds: 60,
        }
    }
}

impl WardenConfig {
    /// Load the configuration from a YAML file, falling back to defaults if
    /// the file does not exist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        match tokio::fs::read_to_string(path.as_ref()).await {
            Ok(contents) => Ok(serde_yaml::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Save the configuration, creating the parent directory if needed
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let yaml = serde_yaml::to_string(self)?;
        tokio::fs::write(path, yaml).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WardenConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.sweep_interval_seconds, 60);
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("ban-warden-no-such-config.yaml");
        let config = WardenConfig::load(&path).await.unwrap();
        assert_eq!(config.sweep_interval_seconds, 60);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!(
            "ban-warden-config-{}/warden.yaml",
            uuid::Uuid::new_v4()
        ));

        let config = WardenConfig {
            data_dir: PathBuf::from("/var/lib/warden"),
            sweep_interval_seconds: 5,
        };
        config.save(&path).await.unwrap();

        let loaded = WardenConfig::load(&path).await.unwrap();
        assert_eq!(loaded.data_dir, PathBuf::from("/var/lib/warden"));
        assert_eq!(loaded.sweep_interval_seconds, 5);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config: WardenConfig = serde_yaml::from_str("sweep_interval_seconds: 10\n").unwrap();
        assert_eq!(config.sweep_interval_seconds, 10);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }
}
