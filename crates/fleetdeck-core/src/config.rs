//! fleetdeck configuration
//!
//! Stored in `~/.config/fleetdeck/config.yaml`, overridable with
//! `$FLEETDECK_CONFIG`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV: &str = "FLEETDECK_CONFIG";

/// Field manager used for dry-run applies during drift detection
pub const DEFAULT_FIELD_MANAGER: &str = "fleetdeck-diff";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetdeckConfig {
    /// Field manager identity for dry-run server-side applies
    #[serde(default = "default_field_manager")]
    pub field_manager: String,

    /// Namespace used when an object or command names none
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Timeout for each cluster call, in seconds (0 disables it)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Indentation width of rendered diff patches
    #[serde(default = "default_diff_indent")]
    pub diff_indent: usize,
}

fn default_field_manager() -> String {
    DEFAULT_FIELD_MANAGER.to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_diff_indent() -> usize {
    4
}

impl Default for FleetdeckConfig {
    fn default() -> Self {
        Self {
            field_manager: default_field_manager(),
            default_namespace: default_namespace(),
            timeout_seconds: default_timeout_seconds(),
            diff_indent: default_diff_indent(),
        }
    }
}

impl FleetdeckConfig {
    /// Load configuration: explicit path, then `$FLEETDECK_CONFIG`, then the
    /// default location. A missing default file yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }
        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| CoreError::Config {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("fleetdeck").join("config.yaml"))
    }

    /// Per-call timeout for cluster I/O, if enabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    fn validate(&self) -> Result<()> {
        if self.field_manager.trim().is_empty() {
            return Err(CoreError::Config {
                message: "fieldManager must not be empty".to_string(),
            });
        }
        if self.diff_indent == 0 {
            return Err(CoreError::Config {
                message: "diffIndent must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = FleetdeckConfig::default();
        assert_eq!(config.field_manager, "fleetdeck-diff");
        assert_eq!(config.default_namespace, "default");
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.diff_indent, 4);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = FleetdeckConfig {
            field_manager: "drift-check".to_string(),
            timeout_seconds: 0,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = FleetdeckConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.timeout(), None);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "defaultNamespace: fleet\n").unwrap();

        let loaded = FleetdeckConfig::load_from(&path).unwrap();
        assert_eq!(loaded.default_namespace, "fleet");
        assert_eq!(loaded.field_manager, DEFAULT_FIELD_MANAGER);
    }

    #[test]
    fn test_rejects_empty_field_manager() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "fieldManager: \"\"\n").unwrap();

        assert!(FleetdeckConfig::load_from(&path).is_err());
    }
}
