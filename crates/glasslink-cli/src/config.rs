//! glasslink CLI configuration
//!
//! One TOML file with a section per layer:
//!
//! ```toml
//! [ble]
//! search_filter = "_74_"
//!
//! [cloud]
//! server_url = "wss://relay.example.com/glasses-ws"
//! core_token = "..."
//!
//! [app]
//! ready_timeout_secs = 30
//! ```
//!
//! Missing keys fall back to defaults, so a partial file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use glasslink_ble::BleConfig;
use glasslink_cloud::CloudConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

const APP_DIR: &str = "glasslink";
const CONFIG_FILE: &str = "config.toml";
const PAIRING_FILE: &str = "pairing.json";

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the glasslink CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Glasses link settings
    pub ble: BleConfig,
    /// Cloud relay settings
    pub cloud: CloudConfig,
    /// CLI behaviour
    pub app: AppSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// How long one-shot commands wait for both arms
    pub ready_timeout_secs: u64,
    /// Directory for the pairing file when `ble.pairing_file` is unset
    pub data_dir: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            ready_timeout_secs: 30,
            data_dir: None,
        }
    }
}

impl AppSettings {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::Config(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        let mut config: AppConfig = toml::from_str(&text)?;
        config.resolve_paths();
        config.validate()?;
        Ok(config)
    }

    /// Load the default config file if present, otherwise use defaults
    pub fn load_default() -> Result<Self> {
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load_from_file(path),
            _ => {
                let mut config = Self::default();
                config.resolve_paths();
                Ok(config)
            }
        }
    }

    /// `<config dir>/glasslink/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Save configuration to a specific file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CliError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }

    /// Give the pairing file a home when none is configured
    pub fn resolve_paths(&mut self) {
        if self.ble.pairing_file.is_some() {
            return;
        }
        let data_dir = self
            .app
            .data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR)));
        self.ble.pairing_file = data_dir.map(|dir| dir.join(PAIRING_FILE));
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        self.ble
            .validate()
            .map_err(|e| CliError::Config(format!("[ble] {}", e)))?;
        self.cloud
            .validate()
            .map_err(|e| CliError::Config(format!("[cloud] {}", e)))?;
        if self.app.ready_timeout_secs == 0 {
            return Err(CliError::Config(
                "[app] ready_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.app.ready_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[ble]\nsearch_filter = \"_74_\"\n\n[cloud]\ncore_token = \"abc\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.ble.search_filter.as_deref(), Some("_74_"));
        assert_eq!(config.ble.max_send_attempts, BleConfig::default().max_send_attempts);
        assert_eq!(config.cloud.core_token.as_deref(), Some("abc"));
        assert!(config.ble.pairing_file.is_some());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.app.data_dir = Some(dir.path().to_path_buf());
        config.resolve_paths();
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.ble.pairing_file,
            Some(dir.path().join(PAIRING_FILE))
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cloud]\naudio_buffer_capacity = 0\n").unwrap();
        assert!(matches!(
            AppConfig::load_from_file(&path),
            Err(CliError::Config(_))
        ));
    }
}
